//! Warrant Audit - append-only, hash-chained audit trail.
//!
//! Every action lifecycle transition (proposed, approved, executed, expired,
//! failed) is recorded as one [`AuditEntry`]. Entries:
//! - are numbered by a global, gap-free sequence in insertion order
//! - link to the previous entry through its SHA-256 entry hash
//! - are indexed per action so an action's trail reads back oldest first
//! - are never updated or deleted
//!
//! Modifying any historical entry breaks the chain, which
//! [`AuditLog::verify_chain`] reports.
//!
//! # Example
//!
//! ```
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! use serde_json::json;
//! use warrant_audit::{AuditEventType, AuditLog};
//!
//! let log = AuditLog::in_memory();
//! log.append("a1", AuditEventType::ActionProposed, chrono::Utc::now(), json!({"tool": "agent.explain_plan"}))
//!     .await
//!     .unwrap();
//!
//! let trail = log.entries_for("a1").await.unwrap();
//! assert_eq!(trail.len(), 1);
//! assert!(log.verify_chain().await.unwrap().valid);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod entry;
mod error;
mod log;

pub use entry::{AuditEntry, AuditEventType};
pub use error::{AuditError, AuditResult};
pub use log::{AuditLog, ChainIssue, ChainVerification};
