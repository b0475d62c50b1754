//! Layered configuration for the warrant gateway.
//!
//! Embedded defaults, then a user or explicit file, then `./warrant.toml`,
//! then `WARRANT_*` environment overrides. The result is validated before it
//! is returned.
//!
//! ```
//! use warrant_config::{Config, ConfigSources};
//!
//! let config = Config::load_from(&ConfigSources::defaults_only()).unwrap();
//! assert_eq!(config.actions.action_ttl_secs, 300);
//! assert_eq!(config.approval.verifier, "token");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod env;
mod error;
mod loader;
mod merge;
mod types;
mod validate;

use std::path::Path;

pub use env::{apply_env_overrides, collect_env_vars};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigSources, LOCAL_CONFIG_FILE, MAX_CONFIG_FILE_SIZE, user_config_path};
pub use merge::deep_merge;
pub use types::{
    ActionsSection, ApprovalSection, BroadcastSection, Config, LoggingSection, ShellSection,
    StorageSection, WorkspaceSection,
};
pub use validate::MAX_TTL_SECS;

impl Config {
    /// Load configuration for the running process.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        loader::load(&ConfigSources::discover(explicit))
    }

    /// Load configuration from the given sources.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is missing, unreadable or
    /// malformed, or the merged configuration is invalid.
    pub fn load_from(sources: &ConfigSources) -> ConfigResult<Self> {
        loader::load(sources)
    }

    /// Re-run validation, e.g. after command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate(self)
    }
}
