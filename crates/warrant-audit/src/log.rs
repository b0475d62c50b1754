//! The audit log over a [`KvStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use warrant_crypto::ContentHash;
use warrant_storage::{KvStore, MemoryKvStore};

use crate::entry::{AuditEntry, AuditEventType};
use crate::error::{AuditError, AuditResult};

// -- Namespace constants --

const NS_ENTRIES: &str = "audit_log";
const NS_ACTION_INDEX: &str = "audit_by_action";
const NS_META: &str = "audit_meta";
const KEY_HEAD: &str = "head";

/// Upper bound on slot races lost by a single append.
const MAX_APPEND_ATTEMPTS: usize = 64;

fn entry_key(id: u64) -> String {
    // Zero padding keeps lexicographic key order equal to numeric order.
    format!("{id:020}")
}

fn encode<T: Serialize + ?Sized>(value: &T) -> AuditResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| AuditError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> AuditResult<T> {
    serde_json::from_slice(bytes).map_err(|e| AuditError::SerializationError(e.to_string()))
}

/// Outcome of [`AuditLog::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Whether every entry is intact and correctly linked.
    pub valid: bool,
    /// How many entries were examined.
    pub entries_checked: usize,
    /// Every problem found, in log order.
    pub issues: Vec<ChainIssue>,
}

/// One problem found while verifying the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainIssue {
    /// Sequence number of the offending entry.
    pub entry_id: u64,
    /// What is wrong with it.
    pub reason: String,
}

/// Append-only, hash-chained audit log.
///
/// Appends are safe under concurrency: each new entry claims the next
/// sequence slot with an insert-if-absent, and a writer that loses the race
/// moves on to the following slot.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Create an audit log over a shared store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create an audit log over a private in-memory store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Append an entry for `action_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the append keeps losing slot
    /// races.
    pub async fn append(
        &self,
        action_id: &str,
        event_type: AuditEventType,
        timestamp: DateTime<Utc>,
        metadata: Value,
    ) -> AuditResult<AuditEntry> {
        let mut last = self.head().await?;

        for _ in 0..MAX_APPEND_ATTEMPTS {
            let previous_hash = match last {
                0 => ContentHash::zero(),
                id => self.previous_hash(id).await?,
            };
            let Some(next) = last.checked_add(1) else {
                break;
            };

            let entry = AuditEntry::new(
                next,
                action_id,
                event_type,
                timestamp,
                metadata.clone(),
                previous_hash,
            );
            let claimed = self
                .store
                .compare_and_swap(NS_ENTRIES, &entry_key(next), None, encode(&entry)?)
                .await?;

            if claimed {
                self.advance_head(next).await?;
                self.index(action_id, next).await?;
                debug!(
                    entry_id = next,
                    action_id,
                    event = %event_type,
                    "audit entry appended"
                );
                return Ok(entry);
            }

            // Someone else holds this slot; chain onto it instead.
            last = next;
        }

        warn!(action_id, event = %event_type, "audit append gave up");
        Err(AuditError::Contention {
            action_id: action_id.to_string(),
            attempts: MAX_APPEND_ATTEMPTS,
        })
    }

    /// Get one entry by sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub async fn get(&self, id: u64) -> AuditResult<Option<AuditEntry>> {
        self.store
            .get(NS_ENTRIES, &entry_key(id))
            .await?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// All entries for one action, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub async fn entries_for(&self, action_id: &str) -> AuditResult<Vec<AuditEntry>> {
        let mut ids: Vec<u64> = match self.store.get(NS_ACTION_INDEX, action_id).await? {
            Some(bytes) => decode(&bytes)?,
            None => Vec::new(),
        };
        ids.sort_unstable();

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get(id).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// The whole log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub async fn all(&self) -> AuditResult<Vec<AuditEntry>> {
        let keys = self.store.list_keys(NS_ENTRIES).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.store.get(NS_ENTRIES, &key).await? {
                entries.push(decode(&bytes)?);
            }
        }
        Ok(entries)
    }

    /// Number of entries in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn count(&self) -> AuditResult<usize> {
        Ok(self.store.list_keys(NS_ENTRIES).await?.len())
    }

    /// Walk the whole log and check every hash and link.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read. Integrity problems are
    /// reported in the result, not as errors.
    pub async fn verify_chain(&self) -> AuditResult<ChainVerification> {
        let entries = self.all().await?;
        let mut issues = Vec::new();
        let mut previous: Option<&AuditEntry> = None;

        for entry in &entries {
            if !entry.is_intact() {
                issues.push(ChainIssue {
                    entry_id: entry.id,
                    reason: "entry hash does not match contents".into(),
                });
            }
            match previous {
                None if entry.id != 1 || !entry.previous_hash.is_zero() => {
                    issues.push(ChainIssue {
                        entry_id: entry.id,
                        reason: "log does not start at a genesis entry".into(),
                    });
                },
                Some(prev) if !entry.follows(prev) => {
                    issues.push(ChainIssue {
                        entry_id: entry.id,
                        reason: format!("does not link to entry {}", prev.id),
                    });
                },
                _ => {},
            }
            previous = Some(entry);
        }

        if !issues.is_empty() {
            warn!(issues = issues.len(), "audit chain verification failed");
        }

        Ok(ChainVerification {
            valid: issues.is_empty(),
            entries_checked: entries.len(),
            issues,
        })
    }

    async fn head(&self) -> AuditResult<u64> {
        match self.store.get(NS_META, KEY_HEAD).await? {
            Some(bytes) => decode(&bytes),
            None => Ok(0),
        }
    }

    async fn previous_hash(&self, id: u64) -> AuditResult<ContentHash> {
        // Slots are claimed before the head moves, so a known id always exists.
        self.get(id)
            .await?
            .map(|entry| entry.entry_hash)
            .ok_or_else(|| AuditError::SerializationError(format!("audit entry {id} is missing")))
    }

    /// Move the head forward to `id`; never moves it backwards.
    async fn advance_head(&self, id: u64) -> AuditResult<()> {
        loop {
            let current = self.store.get(NS_META, KEY_HEAD).await?;
            let head: u64 = match &current {
                Some(bytes) => decode(bytes)?,
                None => 0,
            };
            if head >= id {
                return Ok(());
            }
            if self
                .store
                .compare_and_swap(NS_META, KEY_HEAD, current.as_deref(), encode(&id)?)
                .await?
            {
                return Ok(());
            }
        }
    }

    async fn index(&self, action_id: &str, id: u64) -> AuditResult<()> {
        loop {
            let current = self.store.get(NS_ACTION_INDEX, action_id).await?;
            let mut ids: Vec<u64> = match &current {
                Some(bytes) => decode(bytes)?,
                None => Vec::new(),
            };
            ids.push(id);
            if self
                .store
                .compare_and_swap(
                    NS_ACTION_INDEX,
                    action_id,
                    current.as_deref(),
                    encode(&ids)?,
                )
                .await?
            {
                return Ok(());
            }
        }
    }
}
