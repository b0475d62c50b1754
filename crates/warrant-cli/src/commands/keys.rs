//! keygen and sign: Ed25519 identities for signed approvals.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use warrant_approval::{APPROVAL_KIND, Action, ActionError, ActionService, ApprovalClaim};
use warrant_crypto::{KeyPair, SignedEvent};
use warrant_tools::BroadcastArgs;

use super::print_json;
use crate::theme::Theme;

/// Create a key file, or show the existing one unless `force` is set.
pub(crate) fn keygen(path: &Path, force: bool) -> anyhow::Result<()> {
    if force && path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    } else if path.exists() {
        eprintln!(
            "{}",
            Theme::info("key file exists; showing it (use --force to replace)")
        );
    }
    let key = KeyPair::load_or_generate(path)
        .with_context(|| format!("failed to load key {}", path.display()))?;
    print_json(&json!({
        "public_key": key.export_public_key().to_hex(),
        "key_file": path.display().to_string(),
    }))
}

/// Sign the approval event for an action, or with `artifact` the final
/// artifact a broadcast will publish.
pub(crate) async fn sign(
    service: &ActionService,
    id: &str,
    key_path: &Path,
    artifact: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(key_path)
        .with_context(|| format!("failed to read key {}", key_path.display()))?;
    let key = KeyPair::from_secret_hex(raw.trim())
        .with_context(|| format!("{} is not a hex secret key", key_path.display()))?;
    let action = service.get_action_detail(id).await?.action;

    let event = if artifact {
        final_artifact(&action, &key)?
    } else {
        approval_event(&action, &key, Utc::now().timestamp())?
    };
    print_json(&event)
}

fn approval_event(action: &Action, key: &KeyPair, created_at: i64) -> anyhow::Result<SignedEvent> {
    let content = ApprovalClaim::for_action(action).to_content()?;
    Ok(SignedEvent::sign(key, created_at, APPROVAL_KIND, Vec::new(), content))
}

fn final_artifact(action: &Action, key: &KeyPair) -> anyhow::Result<SignedEvent> {
    let args: BroadcastArgs = serde_json::from_value(action.args.clone()).map_err(|_| {
        ActionError::Validation(format!("{} does not publish an artifact", action.tool))
    })?;
    let signer = key.export_public_key().to_hex();
    if args.actor != signer {
        eprintln!(
            "{}",
            Theme::warning("the action names a different actor; approval will be rejected")
        );
    }
    Ok(SignedEvent::sign(
        key,
        args.created_at,
        args.kind,
        args.tags,
        args.content,
    ))
}
