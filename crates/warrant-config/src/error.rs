/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A config file is not valid TOML or does not fit the schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// File path, or a marker for embedded or merged input.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid config value for {field}: {message}")]
    Validation {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
