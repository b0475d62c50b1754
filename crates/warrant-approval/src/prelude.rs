//! Common imports for driving the action lifecycle.
//!
//! ```
//! use warrant_approval::prelude::*;
//! ```

pub use crate::{
    Action, ActionError, ActionResult, ActionService, ActionStatus, ActionTtls, ApprovalArtifact,
    ApprovalVerifier, Clock, Ledger, ManualClock, SignedEventVerifier, SystemClock,
    TokenApprovalVerifier,
};
