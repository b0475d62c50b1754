//! Per-command correlation.
//!
//! A [`CommandContext`] names one unit of gateway work (a CLI invocation or a
//! planner run) so every log line it produces carries the same `request_id`.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation data for one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandContext {
    /// Unique id for this command.
    pub request_id: Uuid,
    /// Id of the command that spawned this one, if any.
    pub parent_id: Option<Uuid>,
    /// Command name, e.g. `"approve"`.
    pub command: String,
    /// Action the command targets, if known.
    pub action_id: Option<String>,
    /// Who issued the command, if known.
    pub requester: Option<String>,
    /// When the command started.
    pub started_at: DateTime<Utc>,
    /// Free-form fields.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CommandContext {
    /// Context for a new top-level command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            parent_id: None,
            command: command.into(),
            action_id: None,
            requester: None,
            started_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Context for work started on behalf of this one.
    #[must_use]
    pub fn child(&self, command: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            parent_id: Some(self.request_id),
            command: command.into(),
            action_id: None,
            requester: self.requester.clone(),
            started_at: Utc::now(),
            metadata: self.metadata.clone(),
        }
    }

    /// Set the targeted action.
    #[must_use]
    pub fn with_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Set the requester.
    #[must_use]
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Add a metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Time since the command started. Zero if the clock went backwards.
    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        Utc::now()
            .signed_duration_since(self.started_at)
            .max(TimeDelta::zero())
    }

    /// First eight characters of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.request_id.simple().to_string().chars().take(8).collect()
    }

    /// A span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "command",
            request_id = %self.request_id,
            command = %self.command,
            action_id = self.action_id.as_deref(),
            requester = self.requester.as_deref(),
        )
    }
}

/// Enters a [`CommandContext`] span and logs completion on drop.
pub struct CommandGuard {
    context: CommandContext,
    _span: tracing::span::EnteredSpan,
}

impl CommandGuard {
    /// Enter the context's span.
    #[must_use]
    pub fn new(context: CommandContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("command started");
        Self {
            context,
            _span: span,
        }
    }

    /// The entered context.
    #[must_use]
    pub fn context(&self) -> &CommandContext {
        &self.context
    }
}

impl std::fmt::Debug for CommandGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGuard")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Drop for CommandGuard {
    fn drop(&mut self) {
        tracing::debug!(
            elapsed_ms = self.context.elapsed().num_milliseconds(),
            "command completed"
        );
    }
}
