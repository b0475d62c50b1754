//! Write file tool. Creates or overwrites a file inside the workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_workspace::WorkspacePolicy;

use crate::{ExecutionContext, RiskTier, Tool, ToolResult, to_json};

/// Lines of content shown in a preview.
const PREVIEW_LINES: usize = 20;

/// Arguments for [`WriteFileTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    /// Path relative to the workspace root.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// `workspace.write_file`: PRIVILEGED, contained write.
#[derive(Debug, Clone)]
pub struct WriteFileTool {
    workspace: WorkspacePolicy,
}

impl WriteFileTool {
    /// Create the tool over a workspace policy.
    #[must_use]
    pub fn new(workspace: WorkspacePolicy) -> Self {
        Self { workspace }
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    type Args = WriteFileArgs;

    fn name(&self) -> &'static str {
        "workspace.write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file in the workspace. Parent directories are created."
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Privileged
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn validate(&self, args: &WriteFileArgs) -> ToolResult<()> {
        self.workspace.resolve(&args.path)?;
        Ok(())
    }

    fn preview(&self, args: &WriteFileArgs) -> String {
        let lines: Vec<&str> = args.content.lines().collect();
        let mut preview = format!("Write file in workspace: {}", args.path);
        for line in lines.iter().take(PREVIEW_LINES) {
            preview.push_str("\n+ ");
            preview.push_str(line);
        }
        if lines.len() > PREVIEW_LINES {
            preview.push_str("\n+ ...");
        }
        preview
    }

    async fn execute(&self, args: WriteFileArgs, _ctx: &ExecutionContext) -> ToolResult<Value> {
        let written = self.workspace.write(&args.path, &args.content).await?;
        to_json(&written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (WriteFileTool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkspacePolicy::new(dir.path(), 1024).unwrap();
        (WriteFileTool::new(ws), dir)
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let (tool, dir) = tool();
        let out = tool
            .execute(
                WriteFileArgs {
                    path: "docs/notes.md".into(),
                    content: "hello".into(),
                },
                &ExecutionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!({"path": "docs/notes.md", "bytes_written": 5}));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/notes.md")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_preview_lists_content() {
        let (tool, _dir) = tool();
        let preview = tool.preview(&WriteFileArgs {
            path: "r.md".into(),
            content: "# Title\nbody".into(),
        });
        assert_eq!(preview, "Write file in workspace: r.md\n+ # Title\n+ body");
    }

    #[test]
    fn test_preview_caps_long_content() {
        let (tool, _dir) = tool();
        let content = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let preview = tool.preview(&WriteFileArgs {
            path: "long.txt".into(),
            content,
        });
        assert_eq!(preview.lines().count(), 22);
        assert!(preview.ends_with("\n+ 19\n+ ..."));
    }

    #[test]
    fn test_escape_rejected_at_validation() {
        let (tool, _dir) = tool();
        assert!(
            tool.validate(&WriteFileArgs {
                path: "../x".into(),
                content: String::new(),
            })
            .unwrap_err()
            .is_validation()
        );
    }
}
