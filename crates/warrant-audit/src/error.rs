//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with audit logging.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(#[from] warrant_storage::StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The append could not win a slot after repeated contention.
    #[error("audit append contention on {action_id}: gave up after {attempts} attempts")]
    Contention {
        /// Action whose entry could not be appended.
        action_id: String,
        /// How many slots were tried.
        attempts: usize,
    },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
