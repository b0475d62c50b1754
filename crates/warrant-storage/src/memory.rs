//! In-memory key/value store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_key, validate_namespace};

/// In-memory key-value store for tests and ephemeral runs.
///
/// Keys are stored as `"{namespace}\0{key}"` in an ordered map, so key
/// listings come back sorted. A single lock guards the whole map, which makes
/// [`compare_and_swap`](KvStore::compare_and_swap) trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> StorageResult<String> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok(format!("{namespace}\0{key}"))
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = Self::full_key(namespace, key)?;
        let data = self.data.read().map_err(lock_err)?;
        Ok(data.get(&full).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(lock_err)?;
        data.insert(full, value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(lock_err)?;
        Ok(data.remove(&full).is_some())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let data = self.data.read().map_err(lock_err)?;
        Ok(data.contains_key(&full))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let data = self.data.read().map_err(lock_err)?;
        let prefix = format!("{namespace}\0");
        Ok(data
            .range(prefix.clone()..)
            .map_while(|(k, _)| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        validate_namespace(namespace)?;
        let mut data = self.data.write().map_err(lock_err)?;
        let prefix = format!("{namespace}\0");
        let before = data.len();
        data.retain(|k, _| !k.starts_with(&prefix));
        Ok(u64::try_from(before.saturating_sub(data.len())).unwrap_or(u64::MAX))
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(lock_err)?;
        if data.get(&full).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(full, new);
        Ok(true)
    }
}
