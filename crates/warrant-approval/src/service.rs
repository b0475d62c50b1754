//! The action lifecycle: propose, approve, execute.
//!
//! Nothing about an action is cached in memory. Each operation reads the
//! row, checks deadlines and state, then writes the next state with a
//! compare-and-swap against the bytes it read. A caller that loses a race
//! gets [`ActionError::Conflict`].
//!
//! Deadlines are enforced lazily: the first operation to touch an action
//! past its deadline moves it to EXPIRED and records `ACTION_EXPIRED`
//! before reporting [`ActionError::Expired`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use warrant_audit::{AuditEntry, AuditEventType, AuditLog, ChainVerification};
use warrant_tools::{
    ExecutionContext, ProposalContext, RiskTier, ToolDescriptor, ToolRegistry,
};

use crate::action::{Action, ActionStatus, ApprovalToken, ToolResultRecord};
use crate::clock::Clock;
use crate::error::{ActionError, ActionResult};
use crate::ledger::{Ledger, Stored};
use crate::verifier::{ApprovalArtifact, ApprovalVerifier};

/// Lifetimes of proposals and approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTtls {
    /// Time from proposal to approval (or SAFE execution).
    pub action: TimeDelta,
    /// Time from approval to execution.
    pub approval: TimeDelta,
}

impl Default for ActionTtls {
    fn default() -> Self {
        Self {
            action: TimeDelta::seconds(300),
            approval: TimeDelta::seconds(120),
        }
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// The action, now EXECUTED.
    pub action: Action,
    /// Executor output.
    pub result: Value,
}

/// Read-only view of an action for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDetail {
    /// The stored action.
    pub action: Action,
    /// Risk tier of its tool.
    pub risk_tier: RiskTier,
    /// What running it does.
    pub preview: String,
    /// Latest approval token, if one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalToken>,
    /// Executor output, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResultRecord>,
    /// Audit trail, oldest first.
    pub audit: Vec<AuditEntry>,
}

/// Orchestrates the action state machine.
#[derive(Debug, Clone)]
pub struct ActionService {
    ledger: Ledger,
    audit: AuditLog,
    registry: Arc<ToolRegistry>,
    verifier: Arc<dyn ApprovalVerifier>,
    clock: Arc<dyn Clock>,
    ttls: ActionTtls,
}

impl ActionService {
    /// Assemble the service from its collaborators.
    #[must_use]
    pub fn new(
        ledger: Ledger,
        audit: AuditLog,
        registry: Arc<ToolRegistry>,
        verifier: Arc<dyn ApprovalVerifier>,
        clock: Arc<dyn Clock>,
        ttls: ActionTtls,
    ) -> Self {
        Self {
            ledger,
            audit,
            registry,
            verifier,
            clock,
            ttls,
        }
    }

    /// The tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The audit log.
    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Record a proposal to run `tool` with `args`.
    ///
    /// # Errors
    ///
    /// - [`ActionError::Validation`] if the tool is unknown or the arguments
    ///   do not construct. Nothing is persisted in that case.
    /// - [`ActionError::Internal`] if the store or audit log fails.
    pub async fn propose(&self, tool: &str, args: Value, requester: &str) -> ActionResult<Action> {
        let descriptor = self
            .registry
            .get(tool)
            .ok_or_else(|| ActionError::Validation(format!("Unknown tool: {tool}")))?;

        let now = self.clock.now();
        let ctx = ProposalContext {
            requester: requester.to_string(),
            now,
        };
        let args = descriptor.construct(&args, &ctx).map_err(|e| {
            warn!(tool, error = %e, "proposal rejected");
            ActionError::from(e)
        })?;

        let action = Action {
            id: uuid::Uuid::new_v4().to_string(),
            tool: tool.to_string(),
            action_hash: Action::compute_hash(tool, &args),
            args,
            requester: requester.to_string(),
            created_at: now,
            expires_at: deadline(now, self.ttls.action)?,
            status: ActionStatus::Proposed,
            approval_id: None,
            approval_expires_at: None,
            execution_started_at: None,
            executed_at: None,
        };
        self.ledger.insert_action(&action).await?;
        self.audit
            .append(
                &action.id,
                AuditEventType::ActionProposed,
                now,
                json!({
                    "tool": action.tool,
                    "action_hash": action.action_hash,
                    "expires_at": action.expires_at,
                    "requester": action.requester,
                }),
            )
            .await?;

        info!(action_id = %action.id, tool, status = %action.status, "action proposed");
        Ok(action)
    }

    /// Approve a proposed action and issue a single-use token bound to its
    /// current hash.
    ///
    /// # Errors
    ///
    /// - [`ActionError::NotFound`] for an unknown id.
    /// - [`ActionError::Expired`] if the proposal deadline passed. The
    ///   action is EXPIRED afterwards.
    /// - [`ActionError::Conflict`] if the action is not PROPOSED, was already
    ///   claimed by an executor, its stored arguments no longer match its
    ///   hash, or a concurrent call won.
    /// - [`ActionError::Validation`] if the verifier rejects `artifact`.
    pub async fn approve(&self, action_id: &str, artifact: &ApprovalArtifact) -> ActionResult<Action> {
        let stored = self.ledger.load_action(action_id).await?;
        let now = self.clock.now();
        self.expire_if_due(&stored, now).await?;

        if stored.status != ActionStatus::Proposed {
            return Err(ActionError::Conflict(format!(
                "Action must be PROPOSED (status: {})",
                stored.status
            )));
        }
        if stored.execution_started_at.is_some() {
            return Err(ActionError::Conflict(
                "Action execution was already started".into(),
            ));
        }
        check_intact(&stored)?;
        self.descriptor(&stored)?;
        self.verifier.verify(&stored, artifact).inspect_err(|e| {
            warn!(action_id, verifier = self.verifier.name(), error = %e, "approval rejected");
        })?;

        let token = ApprovalToken {
            id: uuid::Uuid::new_v4().to_string(),
            action_id: stored.id.clone(),
            action_hash: stored.action_hash.clone(),
            approved_at: now,
            expires_at: deadline(now, self.ttls.approval)?,
            used: false,
            final_artifact: artifact.final_artifact().cloned(),
        };

        // The token must exist before any row points at it.
        self.ledger.insert_token(&token).await?;
        let mut approved = stored.value().clone();
        approved.status = ActionStatus::Approved;
        approved.approval_id = Some(token.id.clone());
        approved.approval_expires_at = Some(token.expires_at);
        let Some(approved) = self.ledger.replace_action(&stored, approved).await? else {
            return Err(concurrent(action_id));
        };
        self.audit
            .append(
                action_id,
                AuditEventType::ActionApproved,
                now,
                json!({
                    "approval_id": token.id,
                    "approval_expires_at": token.expires_at,
                    "verifier": self.verifier.name(),
                }),
            )
            .await?;

        info!(action_id, tool = %approved.tool, status = %approved.status, "action approved");
        Ok(approved.into_value())
    }

    /// Run an action's tool.
    ///
    /// SAFE actions run straight from PROPOSED. PRIVILEGED actions must be
    /// APPROVED and hold an unused, unexpired token for their current hash;
    /// the token is consumed before the executor starts.
    ///
    /// # Errors
    ///
    /// - [`ActionError::NotFound`] for an unknown id.
    /// - [`ActionError::Expired`] if the proposal or approval deadline
    ///   passed. The action is EXPIRED afterwards.
    /// - [`ActionError::Conflict`] for a wrong state, an already executed or
    ///   claimed action, a missing, used or mismatched token, or stored
    ///   arguments that no longer match the hash.
    /// - [`ActionError::Validation`] if the stored arguments are no longer
    ///   acceptable to the tool, or the executor rejected the request.
    /// - [`ActionError::Internal`] if the tool is no longer registered or
    ///   the executor failed. Executor failures are audited as
    ///   `ACTION_FAILED`.
    pub async fn execute(&self, action_id: &str) -> ActionResult<ExecutionOutcome> {
        let stored = self.ledger.load_action(action_id).await?;
        let now = self.clock.now();
        self.expire_if_due(&stored, now).await?;

        match stored.status {
            ActionStatus::Executed => {
                return Err(ActionError::Conflict("Action already executed".into()));
            },
            ActionStatus::Expired => {
                return Err(ActionError::Conflict("Action has expired".into()));
            },
            ActionStatus::Proposed | ActionStatus::Approved => {},
        }
        let descriptor = self.descriptor(&stored)?;
        if stored.execution_started_at.is_some() {
            return Err(ActionError::Conflict(
                "Action execution was already started".into(),
            ));
        }

        let token = match descriptor.risk_tier() {
            RiskTier::Safe => {
                if stored.status != ActionStatus::Proposed {
                    return Err(ActionError::Conflict(format!(
                        "Action must be PROPOSED (status: {})",
                        stored.status
                    )));
                }
                check_intact(&stored)?;
                None
            },
            RiskTier::Privileged => {
                if stored.status != ActionStatus::Approved {
                    return Err(ActionError::Conflict(format!(
                        "Action must be APPROVED (status: {})",
                        stored.status
                    )));
                }
                check_intact(&stored)?;
                Some(self.usable_token(&stored, now).await?)
            },
        };
        descriptor.check(&stored.args)?;

        // Claim the row so a concurrent executor sees the marker and backs off.
        let mut claimed = stored.value().clone();
        claimed.execution_started_at = Some(now);
        let Some(claimed) = self.ledger.replace_action(&stored, claimed).await? else {
            return Err(concurrent(action_id));
        };

        if let Some(token) = &token {
            if !self.ledger.consume_token(token).await? {
                // Give the claim back; the action is still APPROVED.
                self.ledger
                    .replace_action(&claimed, stored.value().clone())
                    .await?;
                return Err(ActionError::Conflict("Approval already used".into()));
            }
        }

        let ctx = ExecutionContext {
            action_id: action_id.to_string(),
            final_artifact: token.and_then(|t| t.into_value().final_artifact),
        };
        let result = match descriptor.execute(&claimed.args, &ctx).await {
            Ok(result) => result,
            Err(e) => {
                error!(action_id, tool = %claimed.tool, error = %e, "executor failed");
                if let Err(audit_err) = self
                    .audit
                    .append(
                        action_id,
                        AuditEventType::ActionFailed,
                        self.clock.now(),
                        json!({ "error": e.to_string(), "tool": claimed.tool }),
                    )
                    .await
                {
                    error!(action_id, error = %audit_err, "failed to audit executor failure");
                }
                return Err(e.into());
            },
        };

        let finished = self.clock.now();
        let record = ToolResultRecord {
            id: uuid::Uuid::new_v4().to_string(),
            action_id: action_id.to_string(),
            result: result.clone(),
            timestamp: finished,
        };
        self.ledger.record_result(&record).await?;

        let mut executed = claimed.value().clone();
        executed.status = ActionStatus::Executed;
        executed.executed_at = Some(finished);
        let Some(executed) = self.ledger.replace_action(&claimed, executed).await? else {
            return Err(ActionError::Internal(format!(
                "claimed action {action_id} changed during execution"
            )));
        };
        self.audit
            .append(
                action_id,
                AuditEventType::ActionExecuted,
                finished,
                json!({ "result_id": record.id, "tool": executed.tool }),
            )
            .await?;

        info!(action_id, tool = %executed.tool, status = %executed.status, "action executed");
        Ok(ExecutionOutcome {
            action: executed.into_value(),
            result,
        })
    }

    /// An action with its preview, approval, result and audit trail.
    ///
    /// # Errors
    ///
    /// - [`ActionError::NotFound`] for an unknown id.
    /// - [`ActionError::Internal`] if its tool is no longer registered.
    pub async fn get_action_detail(&self, action_id: &str) -> ActionResult<ActionDetail> {
        let stored = self.ledger.load_action(action_id).await?;
        let descriptor = self.descriptor(&stored)?;
        let preview = descriptor.preview(&stored.args)?;
        let approval = match &stored.approval_id {
            Some(id) => self.ledger.load_token(id).await?.map(Stored::into_value),
            None => None,
        };
        let result = self.ledger.result_for(action_id).await?;
        let audit = self.audit.entries_for(action_id).await?;

        Ok(ActionDetail {
            risk_tier: descriptor.risk_tier(),
            action: stored.into_value(),
            preview,
            approval,
            result,
            audit,
        })
    }

    /// All actions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn list_actions(&self) -> ActionResult<Vec<Action>> {
        self.ledger.list_actions().await
    }

    /// Audit entries for one action, or the whole log.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotFound`] for an unknown action id.
    pub async fn audit(&self, action_id: Option<&str>) -> ActionResult<Vec<AuditEntry>> {
        match action_id {
            Some(id) => {
                if self.ledger.find_action(id).await?.is_none() {
                    return Err(ActionError::NotFound(format!("Action not found: {id}")));
                }
                Ok(self.audit.entries_for(id).await?)
            },
            None => Ok(self.audit.all().await?),
        }
    }

    /// Check the audit hash chain.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the log cannot be read.
    pub async fn verify_audit(&self) -> ActionResult<ChainVerification> {
        Ok(self.audit.verify_chain().await?)
    }

    fn descriptor(&self, action: &Action) -> ActionResult<&ToolDescriptor> {
        self.registry.get(&action.tool).ok_or_else(|| {
            error!(action_id = %action.id, tool = %action.tool, "stored action names an unregistered tool");
            ActionError::Internal(format!("No executor registered for tool: {}", action.tool))
        })
    }

    /// Move an action past its proposal deadline to EXPIRED.
    async fn expire_if_due(&self, stored: &Stored<Action>, now: DateTime<Utc>) -> ActionResult<()> {
        if stored.status == ActionStatus::Proposed && now > stored.expires_at {
            self.expire(stored, now, "Proposal expired").await?;
            return Err(ActionError::Expired("Proposal expired".into()));
        }
        Ok(())
    }

    async fn usable_token(
        &self,
        action: &Stored<Action>,
        now: DateTime<Utc>,
    ) -> ActionResult<Stored<ApprovalToken>> {
        if let Some(deadline) = action.approval_expires_at
            && now > deadline
        {
            self.expire(action, now, "Approval expired").await?;
            return Err(ActionError::Expired("Approval expired".into()));
        }
        let Some(approval_id) = &action.approval_id else {
            return Err(ActionError::Conflict("No approval found for action".into()));
        };
        let token = self
            .ledger
            .load_token(approval_id)
            .await?
            .ok_or_else(|| ActionError::Internal(format!("approval token missing: {approval_id}")))?;
        if token.used {
            return Err(ActionError::Conflict("Approval already used".into()));
        }
        if token.action_hash != action.current_hash() {
            warn!(action_id = %action.id, "approval bound to a different hash");
            return Err(ActionError::Conflict(
                "Approval does not match action".into(),
            ));
        }
        if now > token.expires_at {
            self.expire(action, now, "Approval expired").await?;
            return Err(ActionError::Expired("Approval expired".into()));
        }
        Ok(token)
    }

    async fn expire(&self, stored: &Stored<Action>, now: DateTime<Utc>, reason: &str) -> ActionResult<()> {
        let mut expired = stored.value().clone();
        expired.status = ActionStatus::Expired;
        if self.ledger.replace_action(stored, expired).await?.is_none() {
            return Err(concurrent(&stored.id));
        }
        self.audit
            .append(
                &stored.id,
                AuditEventType::ActionExpired,
                now,
                json!({ "reason": reason, "previous_status": stored.status }),
            )
            .await?;
        info!(action_id = %stored.id, tool = %stored.tool, status = %ActionStatus::Expired, reason, "action expired");
        Ok(())
    }
}

fn check_intact(action: &Action) -> ActionResult<()> {
    if action.is_intact() {
        Ok(())
    } else {
        warn!(action_id = %action.id, "stored arguments do not match the action hash");
        Err(ActionError::Conflict("Payload hash mismatch".into()))
    }
}

fn deadline(now: DateTime<Utc>, ttl: TimeDelta) -> ActionResult<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| ActionError::Internal("deadline out of range".into()))
}

fn concurrent(action_id: &str) -> ActionError {
    ActionError::Conflict(format!("Action {action_id} was modified concurrently"))
}
