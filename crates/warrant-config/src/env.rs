//! Environment variable overrides.
//!
//! | Variable | Key |
//! |---|---|
//! | `WARRANT_WORKSPACE_ROOT` | `workspace.root` |
//! | `WARRANT_DB_PATH` | `storage.path` |
//! | `WARRANT_ACTION_TTL` | `actions.action_ttl_secs` |
//! | `WARRANT_APPROVAL_TTL` | `actions.approval_ttl_secs` |
//! | `WARRANT_LOG_LEVEL` | `logging.level` |

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::set_path;

enum Kind {
    Text,
    Seconds,
}

const OVERRIDES: &[(&str, &str, Kind)] = &[
    ("WARRANT_WORKSPACE_ROOT", "workspace.root", Kind::Text),
    ("WARRANT_DB_PATH", "storage.path", Kind::Text),
    ("WARRANT_ACTION_TTL", "actions.action_ttl_secs", Kind::Seconds),
    ("WARRANT_APPROVAL_TTL", "actions.approval_ttl_secs", Kind::Seconds),
    ("WARRANT_LOG_LEVEL", "logging.level", Kind::Text),
];

/// Collect `WARRANT_*` variables from the process environment.
#[must_use]
pub fn collect_env_vars() -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("WARRANT_"))
        .collect()
}

/// Apply overrides from `vars` onto the merged tree. Empty values are
/// ignored. Returns how many were applied.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] if a numeric variable does not parse.
pub fn apply_env_overrides(
    merged: &mut toml::Value,
    vars: &BTreeMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0_usize;
    for (var, path, kind) in OVERRIDES {
        let Some(raw) = vars.get(*var).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = match kind {
            Kind::Text => toml::Value::String(raw.to_owned()),
            Kind::Seconds => {
                let secs: i64 = raw.parse().map_err(|_| {
                    ConfigError::validation(*var, format!("expected whole seconds, got '{raw}'"))
                })?;
                toml::Value::Integer(secs)
            },
        };
        debug!(var, key = path, "environment override");
        set_path(merged, path, value);
        applied = applied.saturating_add(1);
    }
    Ok(applied)
}
