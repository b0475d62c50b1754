//! Read file tool. Reads a file inside the workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_workspace::WorkspacePolicy;

use crate::{ExecutionContext, RiskTier, Tool, ToolResult, to_json};

/// Arguments for [`ReadFileTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    /// Path relative to the workspace root.
    pub path: String,
}

/// `workspace.read_file`: SAFE, contained read with a size cap.
#[derive(Debug, Clone)]
pub struct ReadFileTool {
    workspace: WorkspacePolicy,
}

impl ReadFileTool {
    /// Create the tool over a workspace policy.
    #[must_use]
    pub fn new(workspace: WorkspacePolicy) -> Self {
        Self { workspace }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    type Args = ReadFileArgs;

    fn name(&self) -> &'static str {
        "workspace.read_file"
    }

    fn description(&self) -> &'static str {
        "Read a text file from the workspace. Output is capped at the configured size."
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Safe
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn validate(&self, args: &ReadFileArgs) -> ToolResult<()> {
        self.workspace.resolve(&args.path)?;
        Ok(())
    }

    fn preview(&self, args: &ReadFileArgs) -> String {
        format!("Read file from workspace: {}", args.path)
    }

    async fn execute(&self, args: ReadFileArgs, _ctx: &ExecutionContext) -> ToolResult<Value> {
        let read = self.workspace.read(&args.path).await?;
        to_json(&read)
    }
}
