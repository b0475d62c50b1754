//! Error types for gateway assembly.

use thiserror::Error;

/// Errors raised while booting the gateway.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] warrant_config::ConfigError),

    /// A configured value could not be turned into a component.
    #[error("invalid setting {field}: {message}")]
    Setting {
        /// Dotted config path.
        field: &'static str,
        /// What is wrong.
        message: String,
    },

    /// The store could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] warrant_storage::StorageError),

    /// The workspace root could not be prepared.
    #[error("workspace error: {0}")]
    Sandbox(#[from] warrant_workspace::SandboxError),

    /// Tool registration failed.
    #[error("tool error: {0}")]
    Tool(#[from] warrant_tools::ToolError),

    /// The action service could not be created.
    #[error("action service error: {0}")]
    Action(#[from] warrant_approval::ActionError),

    /// Logging could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] warrant_telemetry::TelemetryError),
}

/// Result type for gateway assembly.
pub type KernelResult<T> = Result<T, KernelError>;
