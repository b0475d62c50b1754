//! Explain plan tool. Echoes a plan back without side effects.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ExecutionContext, RiskTier, Tool, ToolError, ToolResult};

/// Arguments for [`ExplainPlanTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplainPlanArgs {
    /// The plan text.
    pub plan: String,
}

/// `agent.explain_plan`: the SAFE tool an agent uses to state its intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainPlanTool;

#[async_trait::async_trait]
impl Tool for ExplainPlanTool {
    type Args = ExplainPlanArgs;

    fn name(&self) -> &'static str {
        "agent.explain_plan"
    }

    fn description(&self) -> &'static str {
        "Explain a plan in plain language. Has no side effects."
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Safe
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "string",
                    "description": "The plan to explain"
                }
            },
            "required": ["plan"],
            "additionalProperties": false
        })
    }

    fn validate(&self, args: &ExplainPlanArgs) -> ToolResult<()> {
        if args.plan.trim().is_empty() {
            return Err(ToolError::InvalidArguments("plan must not be empty".into()));
        }
        Ok(())
    }

    fn preview(&self, args: &ExplainPlanArgs) -> String {
        format!("Explain plan: {}", args.plan)
    }

    async fn execute(&self, args: ExplainPlanArgs, _ctx: &ExecutionContext) -> ToolResult<Value> {
        Ok(json!({ "plan": args.plan }))
    }
}
