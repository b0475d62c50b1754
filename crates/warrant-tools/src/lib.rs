#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Tools the gateway can run on an agent's behalf, and the registry that
//! holds them.
//!
//! Each tool declares a typed argument struct. Proposing an action turns the
//! raw JSON into that struct or fails ("construct-or-fail"), fills defaults,
//! runs the tool's policy checks and stores the re-serialized result as the
//! canonical arguments. Executing parses the stored arguments again through
//! the same type, so an executor never sees an untyped map.

mod explain_plan;
mod publish;
mod read_file;
mod registry;
mod shell;
mod write_file;

pub use explain_plan::{ExplainPlanArgs, ExplainPlanTool};
pub use publish::{
    BroadcastArgs, BroadcastPolicy, BroadcastTool, NullPublisher, PublishError, PublishResult,
    Publisher, fan_out,
};
pub use read_file::{ReadFileArgs, ReadFileTool};
pub use registry::{ToolDescriptor, ToolRegistry, ToolRegistryBuilder};
pub use shell::{ShellArgs, ShellTool};
pub use write_file::{WriteFileArgs, WriteFileTool};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use warrant_crypto::SignedEvent;
use warrant_workspace::SandboxError;

/// Whether a tool needs a human approval before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Runs straight from a proposal.
    Safe,
    /// Requires a bound, unexpired, single-use approval.
    Privileged,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Safe => "SAFE",
            Self::Privileged => "PRIVILEGED",
        })
    }
}

/// Information available while arguments are being constructed.
#[derive(Debug, Clone)]
pub struct ProposalContext {
    /// Identity of whoever proposed the action.
    pub requester: String,
    /// Proposal time, used for defaulted timestamps.
    pub now: DateTime<Utc>,
}

/// Information available to an executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// The action being executed.
    pub action_id: String,
    /// Independently signed copy of the payload, when the approval carried one.
    pub final_artifact: Option<SignedEvent>,
}

/// Tool errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments could not be constructed or failed a tool rule.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A sandbox policy rejected the request, or sandboxed I/O failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The executor failed for a reason outside the caller's control.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Whether the error is the caller's fault (bad input or forbidden
    /// request) rather than an environmental failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::InvalidArguments(_) => true,
            Self::Sandbox(e) => e.is_policy_violation(),
            Self::ExecutionFailed(_) => false,
        }
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// A tool with a compile-time checked argument type.
#[async_trait::async_trait]
pub trait Tool: Send + Sync + 'static {
    /// The argument structure.
    type Args: DeserializeOwned + Serialize + Send + Sync + 'static;

    /// Unique registry name, e.g. `workspace.write_file`.
    fn name(&self) -> &'static str;

    /// Human-readable description for planners.
    fn description(&self) -> &'static str;

    /// Risk tier.
    fn risk_tier(&self) -> RiskTier;

    /// JSON schema of [`Self::Args`], for planners and the CLI.
    fn input_schema(&self) -> Value;

    /// Whether execution publishes the payload as an external artifact.
    ///
    /// Signature-based approvals of such tools must carry an independently
    /// signed copy of the payload.
    fn publishes_artifact(&self) -> bool {
        false
    }

    /// Fill in defaults at proposal time.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if defaults cannot be derived.
    fn normalize(&self, args: Self::Args, _ctx: &ProposalContext) -> ToolResult<Self::Args> {
        Ok(args)
    }

    /// Tool-specific rules. Runs at proposal time and again before execution.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the arguments break a rule.
    fn validate(&self, _args: &Self::Args) -> ToolResult<()> {
        Ok(())
    }

    /// Human-readable description of what running these arguments will do.
    fn preview(&self, args: &Self::Args) -> String;

    /// Run the tool.
    async fn execute(&self, args: Self::Args, ctx: &ExecutionContext) -> ToolResult<Value>;
}

/// Parse raw JSON into a tool's argument type.
pub(crate) fn parse_args<A: DeserializeOwned>(tool: &str, args: &Value) -> ToolResult<A> {
    serde_json::from_value(args.clone())
        .map_err(|e| ToolError::InvalidArguments(format!("{tool}: {e}")))
}

/// Serialize a tool's output or arguments back into JSON.
pub(crate) fn to_json<T: Serialize>(value: &T) -> ToolResult<Value> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
}
