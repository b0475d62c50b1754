//! Logging and command correlation for the warrant gateway.
//!
//! # Example
//!
//! ```rust,no_run
//! use warrant_telemetry::{CommandContext, CommandGuard, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), warrant_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Json)
//!     .with_directive("warrant_storage=trace");
//! setup_logging(&config)?;
//!
//! let _guard = CommandGuard::new(CommandContext::new("approve").with_action("a-1"));
//! tracing::info!("approving");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod logging;

pub use context::{CommandContext, CommandGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
