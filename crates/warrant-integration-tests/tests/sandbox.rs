//! Workspace and shell confinement seen through the gateway.

mod common;

use common::GatewayHarness;
use serde_json::json;
use warrant_approval::{ActionError, ApprovalArtifact};

#[tokio::test]
async fn test_path_escapes_rejected_at_proposal() {
    let h = GatewayHarness::new();
    for path in ["../outside.txt", "notes/../../outside.txt", "/etc/passwd", ""] {
        let err = h
            .service()
            .propose("workspace.write_file", json!({"path": path, "content": "x"}), "agent")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)), "{path}");
    }
    assert!(h.service().list_actions().await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_out_of_workspace_rejected() {
    let h = GatewayHarness::new();
    let outside = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), h.path("link")).unwrap();

    let err = h
        .service()
        .propose("workspace.write_file", json!({"path": "link/x.txt", "content": "x"}), "agent")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));
    assert!(!outside.path().join("x.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_symlink_is_a_validation_error() {
    let h = GatewayHarness::new();
    std::os::unix::fs::symlink("/nonexistent/secret.txt", h.path("dangling")).unwrap();

    let err = h
        .service()
        .propose("workspace.write_file", json!({"path": "dangling", "content": "x"}), "agent")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(h.service().list_actions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shell_rejections() {
    let h = GatewayHarness::new();
    for command in [
        "rm -rf /",
        "ls; rm -rf /",
        "ls | cat",
        "cat notes.txt > copy.txt",
        "echo $(whoami)",
        "ls && pwd",
        "cat ../secret",
        "",
    ] {
        let err = h
            .service()
            .propose("shell.run_allowlisted", json!({"command": command}), "agent")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)), "{command:?}");
    }
    assert!(h.service().list_actions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_configured_allowlist_applies() {
    let h = GatewayHarness::with_config(|c| c.shell.allowed_commands = vec!["pwd".into()]);
    let err = h
        .service()
        .propose("shell.run_allowlisted", json!({"command": "ls"}), "agent")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));

    h.service()
        .propose("shell.run_allowlisted", json!({"command": "pwd"}), "agent")
        .await
        .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_allowlisted_command_runs_in_workspace() {
    let h = GatewayHarness::new();
    std::fs::write(h.path("notes.txt"), "remember the milk").unwrap();

    let action = h
        .service()
        .propose("shell.run_allowlisted", json!({"command": "cat notes.txt"}), "agent")
        .await
        .unwrap();
    h.service()
        .approve(&action.id, &ApprovalArtifact::Token)
        .await
        .unwrap();
    let outcome = h.service().execute(&action.id).await.unwrap();

    assert_eq!(outcome.result["exit_code"], 0);
    assert_eq!(outcome.result["stdout"], "remember the milk");
}

#[tokio::test]
async fn test_failed_executor_is_audited_and_not_retried() {
    let h = GatewayHarness::new();
    let action = h
        .service()
        .propose("workspace.read_file", json!({"path": "missing.txt"}), "agent")
        .await
        .unwrap();

    let err = h.service().execute(&action.id).await.unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));
    assert_eq!(
        h.trail(&action.id).await,
        vec!["ACTION_PROPOSED", "ACTION_FAILED"]
    );

    std::fs::write(h.path("missing.txt"), "now here").unwrap();
    let err = h.service().execute(&action.id).await.unwrap_err();
    assert!(matches!(err, ActionError::Conflict(_)));
    let err = h
        .service()
        .approve(&action.id, &ApprovalArtifact::Token)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Conflict(_)));
    assert_eq!(
        h.trail(&action.id).await,
        vec!["ACTION_PROPOSED", "ACTION_FAILED"]
    );
}
