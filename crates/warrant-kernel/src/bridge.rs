//! Conversions from [`warrant_config::Config`] sections to component settings.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::debug;
use warrant_approval::{ActionTtls, ApprovalVerifier, SignedEventVerifier, TokenApprovalVerifier};
use warrant_config::{
    ActionsSection, ApprovalSection, BroadcastSection, Config, LoggingSection, StorageSection,
};
use warrant_crypto::PublicKey;
use warrant_storage::{KvStore, MemoryKvStore, SqliteKvStore};
use warrant_telemetry::{LogConfig, LogFormat};
use warrant_tools::{
    BroadcastPolicy, BroadcastTool, ExplainPlanTool, Publisher, ReadFileTool, ShellTool,
    ToolRegistry, WriteFileTool,
};
use warrant_workspace::{ShellPolicy, WorkspacePolicy};

use crate::error::{KernelError, KernelResult};

fn seconds(field: &'static str, secs: u64) -> KernelResult<TimeDelta> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| KernelError::Setting {
            field,
            message: format!("{secs} seconds is out of range"),
        })
}

/// Proposal and approval lifetimes.
///
/// # Errors
///
/// Returns [`KernelError::Setting`] if a lifetime does not fit a duration.
pub fn action_ttls(section: &ActionsSection) -> KernelResult<ActionTtls> {
    Ok(ActionTtls {
        action: seconds("actions.action_ttl_secs", section.action_ttl_secs)?,
        approval: seconds("actions.approval_ttl_secs", section.approval_ttl_secs)?,
    })
}

/// Broadcast limits.
#[must_use]
pub fn broadcast_policy(section: &BroadcastSection) -> BroadcastPolicy {
    BroadcastPolicy {
        destinations: section.destinations.clone(),
        max_content_len: section.max_content_len,
        max_concurrency: section.max_concurrency,
    }
}

/// Logging setup for the configured level, format and directives.
///
/// # Errors
///
/// Returns a telemetry error if the format name is unknown.
pub fn log_config(section: &LoggingSection) -> KernelResult<LogConfig> {
    let format: LogFormat = section.format.parse()?;
    Ok(LogConfig::new(section.level.clone())
        .with_format(format)
        .with_directives(section.directives.iter().cloned()))
}

/// Open the configured store.
///
/// # Errors
///
/// Returns [`KernelError::Storage`] if the database cannot be opened and
/// [`KernelError::Setting`] for an unknown backend.
pub fn open_store(section: &StorageSection) -> KernelResult<Arc<dyn KvStore>> {
    match section.backend.as_str() {
        "sqlite" => {
            debug!(path = %section.path.display(), "opening sqlite store");
            Ok(Arc::new(SqliteKvStore::open(&section.path)?))
        },
        "memory" => Ok(Arc::new(MemoryKvStore::new())),
        other => Err(KernelError::Setting {
            field: "storage.backend",
            message: format!("unsupported backend '{other}'"),
        }),
    }
}

/// Register every built-in tool with its policy.
///
/// # Errors
///
/// Returns [`KernelError::Sandbox`] if the workspace root cannot be created
/// or resolved.
pub fn tool_registry(config: &Config, publisher: Arc<dyn Publisher>) -> KernelResult<ToolRegistry> {
    let workspace = WorkspacePolicy::new(&config.workspace.root, config.workspace.max_read_bytes)?;
    let shell = ShellPolicy::new(workspace.clone(), &config.shell.allowed_commands);

    Ok(ToolRegistry::builder()
        .register(ExplainPlanTool)?
        .register(ReadFileTool::new(workspace.clone()))?
        .register(WriteFileTool::new(workspace))?
        .register(ShellTool::new(shell))?
        .register(BroadcastTool::new(
            publisher,
            broadcast_policy(&config.broadcast),
        ))?
        .build())
}

/// The configured approval verifier.
///
/// Signed mode requires a final artifact for every registered tool that
/// publishes one.
///
/// # Errors
///
/// Returns [`KernelError::Setting`] for an unknown verifier or a trusted
/// signer that is not a valid public key.
pub fn approval_verifier(
    section: &ApprovalSection,
    registry: &ToolRegistry,
) -> KernelResult<Arc<dyn ApprovalVerifier>> {
    match section.verifier.as_str() {
        "token" => Ok(Arc::new(TokenApprovalVerifier)),
        "signed" => {
            let signers = section
                .trusted_signers
                .iter()
                .map(|hex| {
                    PublicKey::from_hex(hex).map_err(|e| KernelError::Setting {
                        field: "approval.trusted_signers",
                        message: format!("'{hex}': {e}"),
                    })
                })
                .collect::<KernelResult<Vec<_>>>()?;
            let artifact_tools = registry
                .descriptors()
                .filter(|d| d.publishes_artifact())
                .map(|d| d.name());
            Ok(Arc::new(
                SignedEventVerifier::new(signers).with_artifact_tools(artifact_tools),
            ))
        },
        other => Err(KernelError::Setting {
            field: "approval.verifier",
            message: format!("unsupported verifier '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use warrant_tools::NullPublisher;

    use super::*;

    #[test]
    fn test_ttls_from_section() {
        let ttls = action_ttls(&ActionsSection {
            action_ttl_secs: 10,
            approval_ttl_secs: 5,
        })
        .unwrap();
        assert_eq!(ttls.action, TimeDelta::seconds(10));
        assert_eq!(ttls.approval, TimeDelta::seconds(5));

        let err = action_ttls(&ActionsSection {
            action_ttl_secs: u64::MAX,
            approval_ttl_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, KernelError::Setting { field, .. } if field == "actions.action_ttl_secs"));
    }

    #[test]
    fn test_log_config_from_section() {
        let config = log_config(&LoggingSection {
            level: "debug".into(),
            format: "json".into(),
            directives: vec!["warrant_storage=trace".into()],
        })
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directives, vec!["warrant_storage=trace"]);

        let bad = LoggingSection {
            format: "xml".into(),
            ..LoggingSection::default()
        };
        assert!(matches!(log_config(&bad), Err(KernelError::Telemetry(_))));
    }

    #[test]
    fn test_registry_has_builtin_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.root = dir.path().join("ws");

        let registry = tool_registry(&config, Arc::new(NullPublisher)).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec![
            "agent.explain_plan",
            "broadcast.publish",
            "shell.run_allowlisted",
            "workspace.read_file",
            "workspace.write_file",
        ]);
        assert!(dir.path().join("ws").is_dir());
    }

    #[test]
    fn test_verifier_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.root = dir.path().to_path_buf();
        let registry = tool_registry(&config, Arc::new(NullPublisher)).unwrap();

        let token = approval_verifier(&ApprovalSection::default(), &registry).unwrap();
        assert_eq!(token.name(), "token");

        let signed = approval_verifier(
            &ApprovalSection {
                verifier: "signed".into(),
                trusted_signers: Vec::new(),
            },
            &registry,
        )
        .unwrap();
        assert_eq!(signed.name(), "signed");

        let err = approval_verifier(
            &ApprovalSection {
                verifier: "signed".into(),
                trusted_signers: vec!["zz".into()],
            },
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, KernelError::Setting { field, .. } if field == "approval.trusted_signers"));
    }

    #[test]
    fn test_unknown_backend() {
        let err = open_store(&StorageSection {
            backend: "postgres".into(),
            path: "x".into(),
        })
        .err()
        .unwrap();
        assert!(matches!(err, KernelError::Setting { field, .. } if field == "storage.backend"));
    }
}
