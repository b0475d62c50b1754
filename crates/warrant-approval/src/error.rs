use warrant_audit::AuditError;
use warrant_crypto::CryptoError;
use warrant_storage::StorageError;
use warrant_tools::ToolError;

/// Errors raised by the action lifecycle.
///
/// Each variant maps to one transport status code via
/// [`status_code`](Self::status_code).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Bad input: unknown tool, arguments that do not construct, malformed
    /// approval artifact, forbidden path or command.
    #[error("{0}")]
    Validation(String),

    /// The action is in the wrong state for the requested transition, or its
    /// approval is used, missing or bound to a different hash.
    #[error("{0}")]
    Conflict(String),

    /// A deadline passed. The action has already been moved to EXPIRED.
    #[error("{0}")]
    Expired(String),

    /// Unknown action id.
    #[error("{0}")]
    NotFound(String),

    /// Misconfiguration or a failing dependency.
    #[error("{0}")]
    Internal(String),
}

impl ActionError {
    /// Transport status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Conflict(_) | Self::Expired(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Expired(_) => "expired",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<ToolError> for ActionError {
    fn from(err: ToolError) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<StorageError> for ActionError {
    fn from(err: StorageError) -> Self {
        Self::Internal(format!("storage: {err}"))
    }
}

impl From<AuditError> for ActionError {
    fn from(err: AuditError) -> Self {
        Self::Internal(format!("audit: {err}"))
    }
}

impl From<CryptoError> for ActionError {
    fn from(err: CryptoError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for action lifecycle operations.
pub type ActionResult<T> = Result<T, ActionError>;
