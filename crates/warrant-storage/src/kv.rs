//! Key/value store trait and the namespace-scoped view over it.
//!
//! All operations are scoped to a namespace. The action ledger uses one
//! namespace per table (`actions`, `approvals`, `audit_log`, ...). Use
//! [`ScopedKvStore`] to pre-bind a namespace and get typed JSON access.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

/// Longest accepted namespace or key, in bytes.
pub const MAX_KEY_LEN: usize = 512;

/// Validate that a namespace is safe for use as a key prefix.
///
/// Namespaces must be non-empty, at most [`MAX_KEY_LEN`] bytes and must not
/// contain the null byte (used internally as the namespace/key separator).
pub(crate) fn validate_namespace(namespace: &str) -> StorageResult<()> {
    validate_part("namespace", namespace)
}

/// Validate that a key is safe for storage. Same rules as namespaces.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    validate_part("key", key)
}

fn validate_part(what: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{what} must not be empty")));
    }
    if value.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey(format!(
            "{what} exceeds {MAX_KEY_LEN} bytes"
        )));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{what} must not contain null bytes"
        )));
    }
    Ok(())
}

/// Raw key-value store trait.
///
/// Implementations must make [`compare_and_swap`](Self::compare_and_swap)
/// atomic with respect to every other write on the same key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by namespace and key.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if the key existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Check if a key exists in a namespace.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace, in ascending byte order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Delete all keys in a namespace. Returns how many were removed.
    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64>;

    /// Atomically replace the value at `key` if it currently equals `expected`.
    ///
    /// `expected = None` means "the key must not exist" (insert-if-absent).
    /// Returns `true` if the swap happened, `false` if the current value did
    /// not match and nothing was written.
    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool>;
}

/// A namespace-scoped view into a [`KvStore`] with typed JSON helpers.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use warrant_storage::{MemoryKvStore, ScopedKvStore};
///
/// let actions = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "actions")?;
/// actions.set_json("a1", &row).await?;
/// let row: Option<ActionRow> = actions.get_json("a1").await?;
/// ```
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Create a scoped view into the given store for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is invalid.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The namespace this store is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a raw byte value by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is invalid, or a
    /// backend error.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        self.inner.get(&self.namespace, key).await
    }

    /// Set a raw byte value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is invalid, or a
    /// backend error.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_key(key)?;
        self.inner.set(&self.namespace, key, value).await
    }

    /// List all keys in this namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }

    /// Compare-and-swap on raw bytes. See [`KvStore::compare_and_swap`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is invalid, or a
    /// backend error.
    pub async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        validate_key(key)?;
        self.inner
            .compare_and_swap(&self.namespace, key, expected, new)
            .await
    }

    /// Deserialize a JSON value from the store.
    ///
    /// Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if deserialization fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        Ok(self.get_json_raw(key).await?.map(|(value, _)| value))
    }

    /// Deserialize a JSON value and also return the exact stored bytes.
    ///
    /// The bytes are what a later [`compare_and_swap`](Self::compare_and_swap)
    /// must present as its expected value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if deserialization fails.
    pub async fn get_json_raw<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<(T, Vec<u8>)>> {
        let Some(bytes) = self.get(key).await? else {
            return Ok(None);
        };
        let value =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some((value, bytes)))
    }

    /// Serialize a value as JSON and store it unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.set(key, encode_json(value)?).await
    }

    /// Insert a JSON value only if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn insert_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<bool> {
        self.compare_and_swap(key, None, encode_json(value)?).await
    }
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}
