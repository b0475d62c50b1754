//! Warrant Approval - the propose, approve, execute state machine.
//!
//! An agent proposes a tool call; the gateway canonicalizes and hashes the
//! arguments and stores the action with a deadline. PRIVILEGED tools then
//! need an approval bound to that exact hash, which yields a single-use
//! token with its own deadline. Execution re-checks state, deadlines, the
//! token and the hash before anything runs. SAFE tools skip the approval
//! step. Every transition is written to the audit log.
//!
//! # Example
//!
//! ```
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! use std::sync::Arc;
//! use serde_json::json;
//! use warrant_approval::prelude::*;
//! use warrant_audit::AuditLog;
//! use warrant_storage::MemoryKvStore;
//! use warrant_tools::{ExplainPlanTool, ToolRegistry};
//!
//! let store = Arc::new(MemoryKvStore::new());
//! let registry = ToolRegistry::builder().register(ExplainPlanTool).unwrap().build();
//! let service = ActionService::new(
//!     Ledger::new(store.clone()).unwrap(),
//!     AuditLog::new(store),
//!     Arc::new(registry),
//!     Arc::new(TokenApprovalVerifier),
//!     Arc::new(SystemClock),
//!     ActionTtls::default(),
//! );
//!
//! let action = service
//!     .propose("agent.explain_plan", json!({"plan": "read the docs"}), "agent")
//!     .await
//!     .unwrap();
//! let outcome = service.execute(&action.id).await.unwrap();
//! assert_eq!(outcome.action.status, ActionStatus::Executed);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod action;
pub mod clock;
mod error;
pub mod ledger;
pub mod planner;
pub mod service;
pub mod verifier;

pub use action::{Action, ActionStatus, ApprovalToken, ToolResultRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ActionError, ActionResult};
pub use ledger::{Ledger, Stored};
pub use planner::{AgentPlan, AgentPlanner, PlanOutput, Planner, ProposedCall, RuleBasedPlanner};
pub use service::{ActionDetail, ActionService, ActionTtls, ExecutionOutcome};
pub use verifier::{
    APPROVAL_KIND, ApprovalArtifact, ApprovalClaim, ApprovalVerifier, SignedEventVerifier,
    TokenApprovalVerifier,
};
