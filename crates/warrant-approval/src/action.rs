//! Action, approval token and tool result rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_crypto::{SignedEvent, action_hash};

/// Lifecycle status of an action.
///
/// Transitions only move forward: PROPOSED to APPROVED or EXPIRED, and
/// APPROVED to EXECUTED or EXPIRED. EXECUTED and EXPIRED are terminal.
/// SAFE-tier actions go straight from PROPOSED to EXECUTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Waiting for approval (or, for SAFE tools, execution).
    Proposed,
    /// Approved and holding an unused token.
    Approved,
    /// Ran to completion.
    Executed,
    /// A deadline passed before the next step.
    Expired,
}

impl ActionStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Expired)
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Proposed,
                Self::Approved | Self::Executed | Self::Expired
            ) | (Self::Approved, Self::Executed | Self::Expired)
        )
    }

    /// Upper-case status name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Executed => "EXECUTED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposal to run one registered tool with fixed, hash-bound arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique id.
    pub id: String,
    /// Registered tool name.
    pub tool: String,
    /// Canonical arguments as constructed by the tool.
    pub args: Value,
    /// Identity of the proposer.
    pub requester: String,
    /// When the action was proposed.
    pub created_at: DateTime<Utc>,
    /// Deadline for approval (or, for SAFE tools, execution).
    pub expires_at: DateTime<Utc>,
    /// Hash of tool name and arguments at proposal time.
    pub action_hash: String,
    /// Current status.
    pub status: ActionStatus,
    /// Id of the approval token the action was approved with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
    /// Deadline of the issued approval token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_expires_at: Option<DateTime<Utc>>,
    /// Set when an executor claimed the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_started_at: Option<DateTime<Utc>>,
    /// When execution finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Hash binding a tool name to its canonical arguments.
    #[must_use]
    pub fn compute_hash(tool: &str, args: &Value) -> String {
        action_hash(&json!({ "tool": tool, "args": args }))
    }

    /// Hash of what is stored right now.
    #[must_use]
    pub fn current_hash(&self) -> String {
        Self::compute_hash(&self.tool, &self.args)
    }

    /// Whether the stored tool and arguments still match the stored hash.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.current_hash() == self.action_hash
    }
}

/// Single-use credential authorizing execution of one action hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalToken {
    /// Unique id.
    pub id: String,
    /// The approved action.
    pub action_id: String,
    /// The exact hash approved.
    pub action_hash: String,
    /// When the approval was granted.
    pub approved_at: DateTime<Utc>,
    /// Deadline for execution.
    pub expires_at: DateTime<Utc>,
    /// Set once when the token is consumed. Never cleared.
    pub used: bool,
    /// Signed copy of the payload supplied with a signature-based approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_artifact: Option<SignedEvent>,
}

/// Output of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    /// Unique id.
    pub id: String,
    /// The executed action.
    pub action_id: String,
    /// Executor output.
    pub result: Value,
    /// When the result was recorded.
    pub timestamp: DateTime<Utc>,
}
