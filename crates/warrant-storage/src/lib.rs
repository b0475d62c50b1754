//! Warrant Storage - the durable row store behind the action ledger.
//!
//! The gateway treats storage as an opaque transactional key/value store.
//! Rows are JSON documents stored under a namespace (`actions`, `approvals`,
//! `audit_log`, ...) and a key. Every state transition is written with
//! [`KvStore::compare_and_swap`], which is the atomic check-then-act primitive
//! that keeps two concurrent requests from both moving the same action out
//! of the same state.
//!
//! # Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryKvStore`] | Tests and ephemeral runs |
//! | [`SqliteKvStore`] | Single-node durable storage (bundled `SQLite`, WAL) |
//!
//! # Example
//!
//! ```
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! use warrant_storage::{KvStore, MemoryKvStore};
//!
//! let store = MemoryKvStore::new();
//! assert!(store.compare_and_swap("actions", "a1", None, b"v1".to_vec()).await.unwrap());
//! // A second writer expecting the key to be absent loses.
//! assert!(!store.compare_and_swap("actions", "a1", None, b"v2".to_vec()).await.unwrap());
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;
pub mod memory;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, ScopedKvStore};
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
