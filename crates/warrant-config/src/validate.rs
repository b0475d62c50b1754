//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for either lifetime: one week.
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub(crate) fn validate(config: &Config) -> ConfigResult<()> {
    validate_actions(config)?;
    validate_workspace(config)?;
    validate_shell(config)?;
    validate_broadcast(config)?;
    validate_storage(config)?;
    validate_approval(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_actions(config: &Config) -> ConfigResult<()> {
    for (field, secs) in [
        ("actions.action_ttl_secs", config.actions.action_ttl_secs),
        ("actions.approval_ttl_secs", config.actions.approval_ttl_secs),
    ] {
        if secs == 0 || secs > MAX_TTL_SECS {
            return Err(ConfigError::validation(
                field,
                format!("must be between 1 and {MAX_TTL_SECS} seconds, got {secs}"),
            ));
        }
    }
    Ok(())
}

fn validate_workspace(config: &Config) -> ConfigResult<()> {
    if config.workspace.root.as_os_str().is_empty() {
        return Err(ConfigError::validation("workspace.root", "must not be empty"));
    }
    if config.workspace.max_read_bytes == 0 {
        return Err(ConfigError::validation(
            "workspace.max_read_bytes",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_shell(config: &Config) -> ConfigResult<()> {
    let commands = &config.shell.allowed_commands;
    if commands.is_empty() {
        return Err(ConfigError::validation(
            "shell.allowed_commands",
            "at least one command must be allowed",
        ));
    }
    if let Some(bad) = commands
        .iter()
        .find(|c| c.is_empty() || c.contains(|ch: char| ch.is_whitespace() || ch == '/'))
    {
        return Err(ConfigError::validation(
            "shell.allowed_commands",
            format!("'{bad}' is not a bare program name"),
        ));
    }
    Ok(())
}

fn validate_broadcast(config: &Config) -> ConfigResult<()> {
    let b = &config.broadcast;
    if b.destinations.iter().any(|d| d.trim().is_empty()) {
        return Err(ConfigError::validation(
            "broadcast.destinations",
            "destinations must not be blank",
        ));
    }
    if b.max_content_len == 0 {
        return Err(ConfigError::validation(
            "broadcast.max_content_len",
            "must be greater than zero",
        ));
    }
    if b.max_concurrency == 0 {
        return Err(ConfigError::validation(
            "broadcast.max_concurrency",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    match config.storage.backend.as_str() {
        "memory" => Ok(()),
        "sqlite" if config.storage.path.as_os_str().is_empty() => Err(ConfigError::validation(
            "storage.path",
            "sqlite backend needs a database path",
        )),
        "sqlite" => Ok(()),
        other => Err(ConfigError::validation(
            "storage.backend",
            format!("unsupported backend '{other}'; expected one of: sqlite, memory"),
        )),
    }
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;
    if !matches!(a.verifier.as_str(), "token" | "signed") {
        return Err(ConfigError::validation(
            "approval.verifier",
            format!("unsupported verifier '{}'; expected one of: token, signed", a.verifier),
        ));
    }
    if let Some(bad) = a
        .trusted_signers
        .iter()
        .find(|k| k.len() != 64 || !k.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return Err(ConfigError::validation(
            "approval.trusted_signers",
            format!("'{bad}' is not a 64 character hex public key"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(ConfigError::validation(
            "logging.level",
            format!("unknown level '{}'", l.level),
        ));
    }
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(ConfigError::validation(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(config: &Config) -> String {
        match validate(config).unwrap_err() {
            ConfigError::Validation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn test_ttl_bounds() {
        let mut c = Config::default();
        c.actions.approval_ttl_secs = 0;
        assert_eq!(field_of(&c), "actions.approval_ttl_secs");
        c.actions.approval_ttl_secs = MAX_TTL_SECS.saturating_add(1);
        assert_eq!(field_of(&c), "actions.approval_ttl_secs");
        c.actions.approval_ttl_secs = MAX_TTL_SECS;
        validate(&c).unwrap();
    }

    #[test]
    fn test_shell_allowlist_shape() {
        let mut c = Config::default();
        c.shell.allowed_commands = Vec::new();
        assert_eq!(field_of(&c), "shell.allowed_commands");
        c.shell.allowed_commands = vec!["/bin/ls".to_owned()];
        assert_eq!(field_of(&c), "shell.allowed_commands");
        c.shell.allowed_commands = vec!["git status".to_owned()];
        assert_eq!(field_of(&c), "shell.allowed_commands");
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut c = Config::default();
        c.workspace.max_read_bytes = 0;
        assert_eq!(field_of(&c), "workspace.max_read_bytes");

        let mut c = Config::default();
        c.broadcast.max_concurrency = 0;
        assert_eq!(field_of(&c), "broadcast.max_concurrency");
    }

    #[test]
    fn test_unknown_strategy_names() {
        let mut c = Config::default();
        c.storage.backend = "postgres".to_owned();
        assert_eq!(field_of(&c), "storage.backend");

        let mut c = Config::default();
        c.approval.verifier = "vibes".to_owned();
        assert_eq!(field_of(&c), "approval.verifier");

        let mut c = Config::default();
        c.logging.format = "xml".to_owned();
        assert_eq!(field_of(&c), "logging.format");
    }

    #[test]
    fn test_trusted_signer_format() {
        let mut c = Config::default();
        c.approval.trusted_signers = vec!["ab".repeat(32)];
        validate(&c).unwrap();
        c.approval.trusted_signers = vec!["zz".repeat(32)];
        assert_eq!(field_of(&c), "approval.trusted_signers");
    }
}
