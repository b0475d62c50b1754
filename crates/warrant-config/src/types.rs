//! Configuration types.
//!
//! Every section implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a partial file still yields a complete configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proposal and approval lifetimes.
    pub actions: ActionsSection,
    /// File tool sandbox.
    pub workspace: WorkspaceSection,
    /// Shell tool allowlist.
    pub shell: ShellSection,
    /// Broadcast tool limits.
    pub broadcast: BroadcastSection,
    /// Durable store.
    pub storage: StorageSection,
    /// Approval verification strategy.
    pub approval: ApprovalSection,
    /// Logging level, format and directives.
    pub logging: LoggingSection,
}

/// Proposal and approval lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsSection {
    /// Seconds from proposal to approval (or SAFE execution).
    pub action_ttl_secs: u64,
    /// Seconds from approval to execution.
    pub approval_ttl_secs: u64,
}

impl Default for ActionsSection {
    fn default() -> Self {
        Self {
            action_ttl_secs: 300,
            approval_ttl_secs: 120,
        }
    }
}

/// File tool sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Root directory. Created on startup if missing.
    pub root: PathBuf,
    /// Maximum bytes returned by a read.
    pub max_read_bytes: usize,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./workspace"),
            max_read_bytes: 65_536,
        }
    }
}

/// Shell tool allowlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Program names that may run.
    pub allowed_commands: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: ["ls", "pwd", "cat", "pytest"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Broadcast tool limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    /// Allowed destinations, also the default target set.
    pub destinations: Vec<String>,
    /// Maximum content length in characters.
    pub max_content_len: usize,
    /// Maximum deliveries in flight.
    pub max_concurrency: usize,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            destinations: vec!["wss://relay.damus.io".to_owned(), "wss://nos.lol".to_owned()],
            max_content_len: 1000,
            max_concurrency: 4,
        }
    }
}

/// Durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// `"sqlite"` or `"memory"`.
    pub backend: String,
    /// Database file for the SQLite backend.
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_owned(),
            path: PathBuf::from("./data/warrant.db"),
        }
    }
}

/// Approval verification strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// `"token"` or `"signed"`.
    pub verifier: String,
    /// Hex Ed25519 public keys allowed to sign approvals. Empty means an
    /// action's requester key.
    pub trusted_signers: Vec<String>,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            verifier: "token".to_owned(),
            trusted_signers: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level (`"trace"` to `"error"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-target directives, e.g. `["warrant_storage=debug"]`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
