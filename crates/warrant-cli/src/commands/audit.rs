//! audit: dump the log, optionally verifying the hash chain.

use serde_json::json;
use warrant_approval::ActionService;

use super::print_json;
use crate::theme::Theme;

pub(crate) async fn audit(
    service: &ActionService,
    action_id: Option<&str>,
    verify: bool,
) -> anyhow::Result<()> {
    let entries = service.audit(action_id).await?;
    if !verify {
        return print_json(&entries);
    }

    let verification = service.verify_audit().await?;
    if verification.valid {
        eprintln!(
            "{}",
            Theme::success(&format!(
                "audit chain intact ({} entries)",
                verification.entries_checked
            ))
        );
    } else {
        eprintln!(
            "{}",
            Theme::warning(&format!(
                "audit chain has {} issue(s)",
                verification.issues.len()
            ))
        );
    }
    print_json(&json!({
        "entries": entries,
        "verification": verification,
    }))
}
