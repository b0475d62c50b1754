//! Sandbox error types.

use thiserror::Error;

/// Errors raised by the sandbox policies.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The path resolves outside the workspace root.
    #[error("path escapes workspace: {path}")]
    OutsideWorkspace {
        /// The path as supplied by the caller.
        path: String,
    },

    /// The path is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The path as supplied by the caller.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The path does not name a regular file.
    #[error("File not found: {path}")]
    NotFound {
        /// The path as supplied by the caller.
        path: String,
    },

    /// The command line contains a shell metacharacter.
    #[error("forbidden token {token:?} in command")]
    ForbiddenToken {
        /// The offending token.
        token: String,
    },

    /// The command's program is not on the allowlist.
    #[error("command not allowlisted: {command}")]
    CommandNotAllowed {
        /// The rejected program name.
        command: String,
    },

    /// The command line could not be tokenized or was empty.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// The workspace root could not be prepared.
    #[error("workspace root unavailable: {0}")]
    RootUnavailable(String),

    /// A filesystem or process operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Whether the error is a policy rejection (caller's fault) rather than
    /// an environmental failure.
    #[must_use]
    pub fn is_policy_violation(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::RootUnavailable(_))
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
