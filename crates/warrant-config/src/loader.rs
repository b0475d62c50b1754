//! Config file discovery and layered loading.
//!
//! Precedence, lowest first:
//! 1. embedded `defaults.toml`
//! 2. the explicit `--config` file, or else `<config dir>/warrant/config.toml`
//! 3. `./warrant.toml`
//! 4. `WARRANT_*` environment overrides
//!
//! The merged tree is deserialized into [`Config`] and validated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Config files larger than this are rejected.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// File name of the project-local overlay.
pub const LOCAL_CONFIG_FILE: &str = "warrant.toml";

/// Where each layer comes from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// File named on the command line. Must exist when set.
    pub explicit: Option<PathBuf>,
    /// Per-user file, used only when `explicit` is unset. Optional.
    pub user: Option<PathBuf>,
    /// Project-local overlay. Optional.
    pub local: Option<PathBuf>,
    /// Environment variables consulted for overrides.
    pub env: BTreeMap<String, String>,
}

impl ConfigSources {
    /// Sources for the running process: the platform config directory, the
    /// current directory and the real environment.
    #[must_use]
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
            user: user_config_path(),
            local: Some(PathBuf::from(LOCAL_CONFIG_FILE)),
            env: collect_env_vars(),
        }
    }

    /// Only the embedded defaults.
    #[must_use]
    pub fn defaults_only() -> Self {
        Self::default()
    }
}

/// Per-user config file location, if the platform has a config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("warrant").join("config.toml"))
}

/// Load and validate configuration from `sources`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the explicit file is missing, any file is
/// unreadable or malformed, an environment override does not parse, or the
/// merged configuration fails validation.
pub(crate) fn load(sources: &ConfigSources) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    if let Some(path) = &sources.explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        })?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded config file");
    } else if let Some(path) = &sources.user
        && let Some(overlay) = try_load_file(path)?
    {
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded user config");
    }

    if let Some(path) = &sources.local
        && let Some(overlay) = try_load_file(path)?
    {
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded local config");
    }

    let applied = apply_env_overrides(&mut merged, &sources.env)?;
    if applied > 0 {
        debug!(applied, "applied environment overrides");
    }

    let config: Config = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: "<merged config>".to_owned(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Parse `path` as TOML, or `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::validation(
            path.display().to_string(),
            format!("config file is {len} bytes, over the {MAX_CONFIG_FILE_SIZE} byte limit"),
        ));
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}
