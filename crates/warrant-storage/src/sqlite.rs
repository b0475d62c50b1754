//! `SQLite`-backed key/value store.
//!
//! One table, `kv(namespace, key, value)`, with a composite primary key.
//! Connections run in WAL mode with a busy timeout. Every call hops onto the
//! blocking thread pool so the async runtime never waits on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_key, validate_namespace};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    namespace TEXT NOT NULL,
    key       TEXT NOT NULL,
    value     BLOB NOT NULL,
    PRIMARY KEY (namespace, key)
) WITHOUT ROWID;
";

/// Durable key-value store backed by a single `SQLite` database file.
#[derive(Clone)]
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKvStore").finish_non_exhaustive()
    }
}

impl SqliteKvStore {
    /// Open (or create) a database file. Parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the file cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Connection(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if `SQLite` cannot be initialized.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        // In-memory databases reject WAL; that is fine.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (ns, key) = (namespace.to_owned(), key.to_owned());
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![ns, key],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (ns, key) = (namespace.to_owned(), key.to_owned());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                params![ns, key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (ns, key) = (namespace.to_owned(), key.to_owned());
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                params![ns, key],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let ns = namespace.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv WHERE namespace = ?1 ORDER BY key")?;
            let keys = stmt
                .query_map(params![ns], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        validate_namespace(namespace)?;
        let ns = namespace.to_owned();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM kv WHERE namespace = ?1", params![ns])?;
            Ok(u64::try_from(removed).unwrap_or(u64::MAX))
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (ns, key) = (namespace.to_owned(), key.to_owned());
        let expected = expected.map(<[u8]>::to_vec);
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![ns, key],
                    |row| row.get(0),
                )
                .optional()?;
            if current != expected {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                params![ns, key, new],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (SqliteKvStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("data").join("warrant.db")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_sqlite_get_set_overwrite() {
        let (store, _dir) = make_store();
        store.set("ns1", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns1", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns1", "k").await.unwrap(), Some(b"v2".to_vec()));
        assert!(store.get("ns1", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_delete_exists() {
        let (store, _dir) = make_store();
        store.set("ns1", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("ns1", "k").await.unwrap());
        assert!(store.delete("ns1", "k").await.unwrap());
        assert!(!store.delete("ns1", "k").await.unwrap());
        assert!(!store.exists("ns1", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_list_and_clear() {
        let (store, _dir) = make_store();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns2", "c", b"3".to_vec()).await.unwrap();
        assert_eq!(store.list_keys("ns1").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.clear_namespace("ns1").await.unwrap(), 2);
        assert!(store.list_keys("ns1").await.unwrap().is_empty());
        assert_eq!(store.list_keys("ns2").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_sqlite_compare_and_swap() {
        let (store, _dir) = make_store();
        assert!(
            store
                .compare_and_swap("ns", "k", None, b"v1".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", None, b"v2".to_vec())
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap("ns", "k", Some(b"v1".as_slice()), b"v2".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", Some(b"v1".as_slice()), b"v3".to_vec())
                .await
                .unwrap()
        );
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warrant.db");
        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("actions", "a1", b"row".to_vec()).await.unwrap();
        }
        let store = SqliteKvStore::open(&path).unwrap();
        assert_eq!(
            store.get("actions", "a1").await.unwrap(),
            Some(b"row".to_vec())
        );
    }

    #[tokio::test]
    async fn test_sqlite_in_memory() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("ns", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("ns", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_rejects_invalid_key() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get("ns", "").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
