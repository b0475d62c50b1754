//! propose, approve, execute and show.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use warrant_approval::{ActionError, ActionService, ApprovalArtifact};
use warrant_crypto::SignedEvent;

use super::print_json;
use crate::theme::Theme;

/// Propose a tool call. `args` is a JSON object.
pub(crate) async fn propose(
    service: &ActionService,
    tool: &str,
    args: &str,
    requester: &str,
) -> anyhow::Result<()> {
    let args: Value = serde_json::from_str(args)
        .map_err(|e| ActionError::Validation(format!("--args is not valid JSON: {e}")))?;
    let action = service.propose(tool, args, requester).await?;
    eprintln!(
        "{}",
        Theme::info(&format!("{} is {}", action.id, Theme::status(action.status.as_str())))
    );
    print_json(&action)
}

/// Approve with a token, or with a signed event and optional final artifact.
pub(crate) async fn approve(
    service: &ActionService,
    id: &str,
    approval: Option<&Path>,
    final_artifact: Option<&Path>,
) -> anyhow::Result<()> {
    let artifact = match (approval, final_artifact) {
        (None, None) => ApprovalArtifact::Token,
        (Some(approval), final_artifact) => ApprovalArtifact::Signed {
            approval: read_event(approval)?,
            final_artifact: final_artifact.map(read_event).transpose()?,
        },
        (None, Some(_)) => {
            return Err(ActionError::Validation("--final requires --approval".into()).into());
        },
    };
    let action = service.approve(id, &artifact).await?;
    eprintln!("{}", Theme::success(&format!("approved {}", action.id)));
    print_json(&action)
}

/// Execute an action and print the action with the tool result.
pub(crate) async fn execute(service: &ActionService, id: &str) -> anyhow::Result<()> {
    let outcome = service.execute(id).await?;
    eprintln!("{}", Theme::success(&format!("executed {}", outcome.action.id)));
    print_json(&outcome)
}

/// Print an action with its preview, approval, result and audit trail.
pub(crate) async fn show(service: &ActionService, id: &str) -> anyhow::Result<()> {
    let detail = service.get_action_detail(id).await?;
    print_json(&detail)
}

fn read_event(path: &Path) -> anyhow::Result<SignedEvent> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let event = serde_json::from_str(&raw).map_err(|e| {
        ActionError::Validation(format!("{} is not a signed event: {e}", path.display()))
    })?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_event_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "{\"id\": 1}").unwrap();

        let err = read_event(&path).unwrap_err();
        let action_err = err.downcast_ref::<ActionError>().unwrap();
        assert_eq!(action_err.status_code(), 400);
    }

    #[test]
    fn test_read_event_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_event(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.downcast_ref::<ActionError>().is_none());
        assert!(err.to_string().contains("failed to read"));
    }
}
