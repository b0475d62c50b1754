//! Durable rows for actions, approval tokens and tool results.
//!
//! Rows are JSON values in three namespaces of a [`KvStore`]:
//!
//! | Namespace | Key | Value |
//! |---|---|---|
//! | `actions` | action id | [`Action`] |
//! | `approvals` | token id | [`ApprovalToken`] |
//! | `tool_results` | action id | [`ToolResultRecord`] |
//!
//! Every mutation of an existing row is a compare-and-swap against the
//! exact bytes that were read, so two writers racing on one row cannot both
//! succeed.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use warrant_storage::{KvStore, ScopedKvStore, StorageError};

use crate::action::{Action, ApprovalToken, ToolResultRecord};
use crate::error::{ActionError, ActionResult};

const ACTIONS: &str = "actions";
const APPROVALS: &str = "approvals";
const TOOL_RESULTS: &str = "tool_results";

/// A row together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    value: T,
    raw: Vec<u8>,
}

impl<T> Stored<T> {
    /// The decoded row.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the decoded row.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    /// The bytes a later swap must present.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl<T> std::ops::Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Typed access to the action lifecycle rows.
#[derive(Clone)]
pub struct Ledger {
    actions: ScopedKvStore,
    approvals: ScopedKvStore,
    tool_results: ScopedKvStore,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if a namespace is rejected by the
    /// store.
    pub fn new(store: Arc<dyn KvStore>) -> ActionResult<Self> {
        Ok(Self {
            actions: ScopedKvStore::new(Arc::clone(&store), ACTIONS)?,
            approvals: ScopedKvStore::new(Arc::clone(&store), APPROVALS)?,
            tool_results: ScopedKvStore::new(store, TOOL_RESULTS)?,
        })
    }

    /// Persist a new action.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the id is already taken or the
    /// store fails.
    pub async fn insert_action(&self, action: &Action) -> ActionResult<()> {
        if !self.actions.insert_json(&action.id, action).await? {
            return Err(ActionError::Internal(format!(
                "action id collision: {}",
                action.id
            )));
        }
        Ok(())
    }

    /// Load an action with its stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotFound`] for an unknown id.
    pub async fn load_action(&self, id: &str) -> ActionResult<Stored<Action>> {
        load(&self.actions, id)
            .await?
            .ok_or_else(|| ActionError::NotFound(format!("Action not found: {id}")))
    }

    /// Load an action if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn find_action(&self, id: &str) -> ActionResult<Option<Action>> {
        Ok(load(&self.actions, id).await?.map(Stored::into_value))
    }

    /// Replace an action row if it still holds the bytes in `current`.
    ///
    /// Returns the new row, or `None` if another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the status would move backwards
    /// or the store fails.
    pub async fn replace_action(
        &self,
        current: &Stored<Action>,
        next: Action,
    ) -> ActionResult<Option<Stored<Action>>> {
        if current.status != next.status && !current.status.can_become(next.status) {
            return Err(ActionError::Internal(format!(
                "illegal transition {} -> {}",
                current.status, next.status
            )));
        }
        let id = next.id.clone();
        swap(&self.actions, &id, current.raw(), next).await
    }

    /// All actions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn list_actions(&self) -> ActionResult<Vec<Action>> {
        let mut actions = Vec::new();
        for key in self.actions.list_keys().await? {
            if let Some(action) = self.actions.get_json::<Action>(&key).await? {
                actions.push(action);
            }
        }
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(actions)
    }

    /// Persist a new approval token.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] on an id collision or store failure.
    pub async fn insert_token(&self, token: &ApprovalToken) -> ActionResult<()> {
        if !self.approvals.insert_json(&token.id, token).await? {
            return Err(ActionError::Internal(format!(
                "approval id collision: {}",
                token.id
            )));
        }
        debug!(action_id = %token.action_id, approval_id = %token.id, "approval stored");
        Ok(())
    }

    /// Load a token by id.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn load_token(&self, id: &str) -> ActionResult<Option<Stored<ApprovalToken>>> {
        Ok(load(&self.approvals, id).await?)
    }

    /// Mark a token used if it is still unused and unchanged.
    ///
    /// Returns `false` if the token was already consumed or changed.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn consume_token(&self, token: &Stored<ApprovalToken>) -> ActionResult<bool> {
        if token.used {
            return Ok(false);
        }
        let mut used = token.value().clone();
        used.used = true;
        let id = used.id.clone();
        Ok(swap(&self.approvals, &id, token.raw(), used).await?.is_some())
    }

    /// Persist the output of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if a result already exists for the
    /// action or the store fails.
    pub async fn record_result(&self, record: &ToolResultRecord) -> ActionResult<()> {
        if !self
            .tool_results
            .insert_json(&record.action_id, record)
            .await?
        {
            return Err(ActionError::Internal(format!(
                "result already recorded for action {}",
                record.action_id
            )));
        }
        Ok(())
    }

    /// The recorded output of an action, if it ran.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if the store fails.
    pub async fn result_for(&self, action_id: &str) -> ActionResult<Option<ToolResultRecord>> {
        Ok(self.tool_results.get_json(action_id).await?)
    }
}

async fn load<T: DeserializeOwned>(
    scope: &ScopedKvStore,
    key: &str,
) -> Result<Option<Stored<T>>, StorageError> {
    Ok(scope
        .get_json_raw(key)
        .await?
        .map(|(value, raw)| Stored { value, raw }))
}

async fn swap<T: Serialize>(
    scope: &ScopedKvStore,
    key: &str,
    expected: &[u8],
    next: T,
) -> ActionResult<Option<Stored<T>>> {
    let raw = serde_json::to_vec(&next).map_err(|e| ActionError::Internal(e.to_string()))?;
    if scope
        .compare_and_swap(key, Some(expected), raw.clone())
        .await?
    {
        Ok(Some(Stored { value: next, raw }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionStatus;
    use chrono::Utc;
    use serde_json::json;
    use warrant_storage::MemoryKvStore;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    fn action(id: &str) -> Action {
        let args = json!({"plan": "x"});
        Action {
            id: id.into(),
            tool: "agent.explain_plan".into(),
            action_hash: Action::compute_hash("agent.explain_plan", &args),
            args,
            requester: "agent".into(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            status: ActionStatus::Proposed,
            approval_id: None,
            approval_expires_at: None,
            execution_started_at: None,
            executed_at: None,
        }
    }

    fn token(id: &str, action_id: &str) -> ApprovalToken {
        ApprovalToken {
            id: id.into(),
            action_id: action_id.into(),
            action_hash: "h".into(),
            approved_at: Utc::now(),
            expires_at: Utc::now(),
            used: false,
            final_artifact: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let ledger = ledger();
        ledger.insert_action(&action("a1")).await.unwrap();
        assert_eq!(ledger.load_action("a1").await.unwrap().id, "a1");
        assert!(ledger.insert_action(&action("a1")).await.is_err());
        assert!(matches!(
            ledger.load_action("missing").await,
            Err(ActionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_replace_loses() {
        let ledger = ledger();
        ledger.insert_action(&action("a1")).await.unwrap();
        let first = ledger.load_action("a1").await.unwrap();
        let second = ledger.load_action("a1").await.unwrap();

        let mut approved = first.value().clone();
        approved.status = ActionStatus::Approved;
        assert!(ledger.replace_action(&first, approved).await.unwrap().is_some());

        let mut expired = second.value().clone();
        expired.status = ActionStatus::Expired;
        assert!(ledger.replace_action(&second, expired).await.unwrap().is_none());
        assert_eq!(
            ledger.load_action("a1").await.unwrap().status,
            ActionStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_backwards_transition_refused() {
        let ledger = ledger();
        let mut executed = action("a1");
        executed.status = ActionStatus::Executed;
        ledger.insert_action(&executed).await.unwrap();
        let stored = ledger.load_action("a1").await.unwrap();

        let mut proposed = stored.value().clone();
        proposed.status = ActionStatus::Proposed;
        assert!(ledger.replace_action(&stored, proposed).await.is_err());
    }

    #[tokio::test]
    async fn test_token_loaded_by_id_and_consumed_once() {
        let ledger = ledger();
        assert!(ledger.load_token("t1").await.unwrap().is_none());

        ledger.insert_token(&token("t1", "a1")).await.unwrap();
        assert!(ledger.insert_token(&token("t1", "a1")).await.is_err());
        let stored = ledger.load_token("t1").await.unwrap().unwrap();
        assert_eq!(stored.action_id, "a1");

        assert!(ledger.consume_token(&stored).await.unwrap());
        assert!(!ledger.consume_token(&stored).await.unwrap());
        assert!(ledger.load_token("t1").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_results_recorded_once() {
        let ledger = ledger();
        let record = ToolResultRecord {
            id: "r1".into(),
            action_id: "a1".into(),
            result: json!({"ok": true}),
            timestamp: Utc::now(),
        };
        ledger.record_result(&record).await.unwrap();
        assert!(ledger.record_result(&record).await.is_err());
        assert_eq!(ledger.result_for("a1").await.unwrap(), Some(record));
    }
}
