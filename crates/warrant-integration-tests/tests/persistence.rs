//! Durable state across gateway restarts.

use std::sync::Arc;

use serde_json::json;
use warrant_approval::{ActionError, ActionStatus, ApprovalArtifact, ManualClock};
use warrant_audit::AuditEventType;
use warrant_config::Config;
use warrant_kernel::Kernel;

fn sqlite_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.backend = "sqlite".into();
    config.storage.path = dir.join("data/warrant.db");
    config.workspace.root = dir.join("workspace");
    config
}

#[tokio::test]
async fn test_approval_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let kernel = Kernel::build(sqlite_config(dir.path())).unwrap();
        let action = kernel
            .service()
            .propose("workspace.write_file", json!({"path": "kept.txt", "content": "v1"}), "agent")
            .await
            .unwrap();
        kernel
            .service()
            .approve(&action.id, &ApprovalArtifact::Token)
            .await
            .unwrap();
        action.id
    };

    let kernel = Kernel::build(sqlite_config(dir.path())).unwrap();
    let outcome = kernel.service().execute(&id).await.unwrap();
    assert_eq!(outcome.action.status, ActionStatus::Executed);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("workspace/kept.txt")).unwrap(),
        "v1"
    );

    let trail: Vec<_> = kernel
        .service()
        .audit(Some(&id))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(trail, vec![
        AuditEventType::ActionProposed,
        AuditEventType::ActionApproved,
        AuditEventType::ActionExecuted,
    ]);
    assert!(kernel.service().verify_audit().await.unwrap().valid);
}

#[tokio::test]
async fn test_used_token_stays_used_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let kernel = Kernel::build(sqlite_config(dir.path())).unwrap();
        let action = kernel
            .service()
            .propose("workspace.write_file", json!({"path": "once.txt", "content": "x"}), "agent")
            .await
            .unwrap();
        kernel
            .service()
            .approve(&action.id, &ApprovalArtifact::Token)
            .await
            .unwrap();
        kernel.service().execute(&action.id).await.unwrap();
        action.id
    };

    let kernel = Kernel::build(sqlite_config(dir.path())).unwrap();
    let err = kernel.service().execute(&id).await.unwrap_err();
    assert!(matches!(err, ActionError::Conflict(_)));

    let detail = kernel.service().get_action_detail(&id).await.unwrap();
    assert!(detail.approval.unwrap().used);
    assert_eq!(detail.result.unwrap().result["path"], "once.txt");
}

#[tokio::test]
async fn test_expiry_observed_by_later_process() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::starting_now());

    let id = {
        let kernel = Kernel::builder(sqlite_config(dir.path()))
            .with_clock(clock.clone())
            .build()
            .unwrap();
        kernel
            .service()
            .propose("agent.explain_plan", json!({"plan": "tidy up"}), "agent")
            .await
            .unwrap()
            .id
    };

    clock.advance_secs(3600);
    let kernel = Kernel::builder(sqlite_config(dir.path()))
        .with_clock(clock)
        .build()
        .unwrap();
    let err = kernel.service().execute(&id).await.unwrap_err();
    assert!(matches!(err, ActionError::Expired(_)));

    let actions = kernel.service().list_actions().await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].status, ActionStatus::Expired);
}
