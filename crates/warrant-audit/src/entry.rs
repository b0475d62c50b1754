//! Audit entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_crypto::ContentHash;

/// Lifecycle events that are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    /// An action was proposed and persisted.
    ActionProposed,
    /// An action was approved and a token issued.
    ActionApproved,
    /// An action's executor ran to completion.
    ActionExecuted,
    /// An action (or its approval) passed its deadline.
    ActionExpired,
    /// An action's executor returned an error.
    ActionFailed,
}

impl AuditEventType {
    /// The stored name, e.g. `ACTION_PROPOSED`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActionProposed => "ACTION_PROPOSED",
            Self::ActionApproved => "ACTION_APPROVED",
            Self::ActionExecuted => "ACTION_EXECUTED",
            Self::ActionExpired => "ACTION_EXPIRED",
            Self::ActionFailed => "ACTION_FAILED",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the global log, starting at 1.
    pub id: u64,
    /// Action this entry belongs to.
    pub action_id: String,
    /// What happened.
    pub event_type: AuditEventType,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Event-specific details (tool name, error message, ...).
    pub metadata: Value,
    /// Entry hash of the previous entry, or zero for the first entry.
    pub previous_hash: ContentHash,
    /// Hash over every other field of this entry.
    pub entry_hash: ContentHash,
}

impl AuditEntry {
    /// Build an entry and seal it with its hash.
    #[must_use]
    pub fn new(
        id: u64,
        action_id: impl Into<String>,
        event_type: AuditEventType,
        timestamp: DateTime<Utc>,
        metadata: Value,
        previous_hash: ContentHash,
    ) -> Self {
        let mut entry = Self {
            id,
            action_id: action_id.into(),
            event_type,
            timestamp,
            metadata,
            previous_hash,
            entry_hash: ContentHash::zero(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Recompute the hash from the entry's current contents.
    #[must_use]
    pub fn compute_hash(&self) -> ContentHash {
        ContentHash::of_value(&json!({
            "id": self.id,
            "action_id": self.action_id,
            "event_type": self.event_type.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
            "metadata": self.metadata,
            "previous_hash": self.previous_hash.to_hex(),
        }))
    }

    /// Whether the stored hash still matches the contents.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }

    /// Whether this entry links directly onto `previous`.
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.previous_hash == previous.entry_hash && Some(self.id) == previous.id.checked_add(1)
    }
}
