//! Planner contract and the agent loop that turns plans into proposals.
//!
//! A planner only ever suggests tool calls. Every suggestion goes through
//! [`ActionService::propose`], so planned actions get the same validation,
//! hashing and approval gate as hand-written ones.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::action::Action;
use crate::error::ActionResult;
use crate::service::ActionService;

/// One suggested tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCall {
    /// Registered tool name.
    pub tool_name: String,
    /// Raw arguments.
    pub args: Value,
}

/// A planner's answer for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    /// One-line summary.
    pub summary: String,
    /// Suggested calls, in order.
    pub proposed_actions: Vec<ProposedCall>,
}

/// Turns a goal into suggested tool calls.
#[async_trait::async_trait]
pub trait Planner: Send + Sync + std::fmt::Debug {
    /// Plan for `goal` using only `tool_names`.
    ///
    /// # Errors
    ///
    /// Returns an error if no plan can be produced.
    async fn plan(&self, goal: &str, tool_names: &[String]) -> ActionResult<PlanOutput>;
}

/// Deterministic planner with no model behind it.
///
/// A goal mentioning "readme" becomes a README write; anything else becomes
/// a plan explanation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedPlanner;

#[async_trait::async_trait]
impl Planner for RuleBasedPlanner {
    async fn plan(&self, goal: &str, _tool_names: &[String]) -> ActionResult<PlanOutput> {
        if goal.to_lowercase().contains("readme") {
            return Ok(PlanOutput {
                summary: "Create a README file in workspace.".into(),
                proposed_actions: vec![ProposedCall {
                    tool_name: "workspace.write_file".into(),
                    args: json!({
                        "path": "README.generated.md",
                        "content": format!("# Generated\n\n{goal}\n"),
                    }),
                }],
            });
        }
        Ok(PlanOutput {
            summary: "Summarize the user goal.".into(),
            proposed_actions: vec![ProposedCall {
                tool_name: "agent.explain_plan".into(),
                args: json!({ "plan": goal }),
            }],
        })
    }
}

/// Planner output after every suggestion was proposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPlan {
    /// The planner's summary.
    pub summary: String,
    /// Created actions, in suggestion order.
    pub actions: Vec<Action>,
}

/// Runs a planner and proposes what it suggests.
#[derive(Debug, Clone)]
pub struct AgentPlanner {
    planner: Arc<dyn Planner>,
    service: Arc<ActionService>,
}

impl AgentPlanner {
    /// Pair a planner with the service that will receive its proposals.
    #[must_use]
    pub fn new(planner: Arc<dyn Planner>, service: Arc<ActionService>) -> Self {
        Self { planner, service }
    }

    /// Plan for `goal` and propose each suggested call on behalf of
    /// `requester`.
    ///
    /// # Errors
    ///
    /// Returns the planner's error, or the first proposal error. Proposals
    /// made before the failing one stay recorded.
    pub async fn plan(&self, goal: &str, requester: &str) -> ActionResult<AgentPlan> {
        let tool_names: Vec<String> = self
            .service
            .registry()
            .names()
            .map(str::to_string)
            .collect();
        let output = self.planner.plan(goal, &tool_names).await?;

        let mut actions = Vec::with_capacity(output.proposed_actions.len());
        for call in output.proposed_actions {
            actions.push(
                self.service
                    .propose(&call.tool_name, call.args, requester)
                    .await?,
            );
        }
        info!(requester, proposed = actions.len(), "plan proposed");

        Ok(AgentPlan {
            summary: output.summary,
            actions,
        })
    }
}
