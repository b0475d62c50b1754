//! Shell tool. Runs one allowlisted program inside the workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_workspace::ShellPolicy;

use crate::{ExecutionContext, RiskTier, Tool, ToolResult, to_json};

/// Arguments for [`ShellTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellArgs {
    /// Command line, e.g. `ls -la`.
    pub command: String,
}

/// `shell.run_allowlisted`: PRIVILEGED. The command is checked when proposed
/// and again right before it runs.
#[derive(Debug, Clone)]
pub struct ShellTool {
    policy: ShellPolicy,
}

impl ShellTool {
    /// Create the tool over a shell policy.
    #[must_use]
    pub fn new(policy: ShellPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait::async_trait]
impl Tool for ShellTool {
    type Args = ShellArgs;

    fn name(&self) -> &'static str {
        "shell.run_allowlisted"
    }

    fn description(&self) -> &'static str {
        "Run an allowlisted command in the workspace. No pipes, redirects or substitution."
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Privileged
    }

    fn input_schema(&self) -> Value {
        let allowed: Vec<&str> = self.policy.allowed_commands().collect();
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": format!("Command line. Allowed programs: {}", allowed.join(", "))
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn validate(&self, args: &ShellArgs) -> ToolResult<()> {
        self.policy.check(&args.command)?;
        Ok(())
    }

    fn preview(&self, args: &ShellArgs) -> String {
        format!("Run shell command in workspace: {}", args.command)
    }

    async fn execute(&self, args: ShellArgs, _ctx: &ExecutionContext) -> ToolResult<Value> {
        let output = self.policy.run(&args.command).await?;
        to_json(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warrant_workspace::WorkspacePolicy;

    fn tool() -> (ShellTool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkspacePolicy::new(dir.path(), 1024).unwrap();
        (ShellTool::new(ShellPolicy::new(ws, ["ls", "pwd", "cat"])), dir)
    }

    #[test]
    fn test_rejections_are_validation_errors() {
        let (tool, _dir) = tool();
        for command in ["rm -rf /", "ls | cat", "cat ../secret"] {
            let err = tool
                .validate(&ShellArgs {
                    command: command.into(),
                })
                .unwrap_err();
            assert!(err.is_validation(), "{command}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_result_shape() {
        let (tool, dir) = tool();
        std::fs::write(dir.path().join("f.txt"), "data").unwrap();
        let out = tool
            .execute(
                ShellArgs {
                    command: "cat f.txt".into(),
                },
                &ExecutionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(out["command"], "cat f.txt");
        assert_eq!(out["exit_code"], 0);
        assert_eq!(out["stdout"], "data");
        assert_eq!(out["stderr"], "");
    }

    #[test]
    fn test_schema_lists_allowed_programs() {
        let (tool, _dir) = tool();
        let schema = tool.input_schema();
        let description = schema["properties"]["command"]["description"]
            .as_str()
            .unwrap();
        assert!(description.ends_with("cat, ls, pwd"));
    }
}
