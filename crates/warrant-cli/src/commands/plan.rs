//! plan and tools.

use serde_json::{Value, json};
use warrant_approval::AgentPlanner;
use warrant_tools::ToolRegistry;

use super::print_json;

pub(crate) async fn plan(planner: &AgentPlanner, goal: &str, requester: &str) -> anyhow::Result<()> {
    let plan = planner.plan(goal, requester).await?;
    print_json(&plan)
}

pub(crate) fn tools(registry: &ToolRegistry) -> anyhow::Result<()> {
    print_json(&describe(registry))
}

fn describe(registry: &ToolRegistry) -> Vec<Value> {
    registry
        .descriptors()
        .map(|d| {
            json!({
                "name": d.name(),
                "description": d.description(),
                "risk_tier": d.risk_tier(),
                "publishes_artifact": d.publishes_artifact(),
                "input_schema": d.input_schema(),
            })
        })
        .collect()
}
