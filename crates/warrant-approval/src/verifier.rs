//! Approval verification strategies.
//!
//! An approval is only ever valid for the exact action hash it names. Two
//! strategies are provided:
//!
//! - [`TokenApprovalVerifier`]: the approver is co-located with the gateway
//!   and the approval call itself is the proof. The resulting single-use
//!   token carries the binding.
//! - [`SignedEventVerifier`]: an external approver signs an event whose
//!   content names `{action_id, action_hash}`. Tools that publish their
//!   payload also need a second signed event carrying that payload, and
//!   every published field must match the stored arguments.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use warrant_crypto::{PublicKey, SignedEvent, canonical_encode_serialize};

use crate::action::Action;
use crate::error::{ActionError, ActionResult};

/// Event kind of a signed approval.
pub const APPROVAL_KIND: u32 = 27_235;

/// Material supplied with an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalArtifact {
    /// No external material.
    Token,
    /// Externally signed approval.
    Signed {
        /// Event naming the approved action id and hash.
        approval: SignedEvent,
        /// Signed copy of the payload, for tools that publish one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_artifact: Option<SignedEvent>,
    },
}

impl ApprovalArtifact {
    /// The signed payload, if any.
    #[must_use]
    pub fn final_artifact(&self) -> Option<&SignedEvent> {
        match self {
            Self::Token => None,
            Self::Signed { final_artifact, .. } => final_artifact.as_ref(),
        }
    }
}

/// What a signed approval's content must say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalClaim {
    /// The approved action.
    pub action_id: String,
    /// The approved hash.
    pub action_hash: String,
}

impl ApprovalClaim {
    /// The claim for an action as it is stored now.
    #[must_use]
    pub fn for_action(action: &Action) -> Self {
        Self {
            action_id: action.id.clone(),
            action_hash: action.current_hash(),
        }
    }

    /// Canonical JSON text to use as event content.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Internal`] if encoding fails.
    pub fn to_content(&self) -> ActionResult<String> {
        let bytes =
            canonical_encode_serialize(self).map_err(|e| ActionError::Internal(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ActionError::Internal(e.to_string()))
    }
}

/// Checks an approval artifact against the action it claims to approve.
pub trait ApprovalVerifier: Send + Sync + std::fmt::Debug {
    /// Strategy name, recorded in the audit trail.
    fn name(&self) -> &'static str;

    /// Accept or reject `artifact` for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] if the artifact does not approve
    /// this action as currently stored.
    fn verify(&self, action: &Action, artifact: &ApprovalArtifact) -> ActionResult<()>;
}

/// Accepts the approval call itself as the proof.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenApprovalVerifier;

impl ApprovalVerifier for TokenApprovalVerifier {
    fn name(&self) -> &'static str {
        "token"
    }

    fn verify(&self, _action: &Action, artifact: &ApprovalArtifact) -> ActionResult<()> {
        match artifact {
            ApprovalArtifact::Token => Ok(()),
            ApprovalArtifact::Signed { .. } => Err(ActionError::Validation(
                "Signed approvals are not accepted; approve without an artifact".into(),
            )),
        }
    }
}

/// Requires an Ed25519-signed approval event from a trusted key.
#[derive(Debug, Clone, Default)]
pub struct SignedEventVerifier {
    trusted: BTreeSet<String>,
    artifact_tools: BTreeSet<String>,
}

impl SignedEventVerifier {
    /// Trust exactly `signers`. With no signers, an action may only be
    /// approved by the key named as its requester.
    #[must_use]
    pub fn new(signers: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            trusted: signers.into_iter().map(|k| k.to_hex()).collect(),
            artifact_tools: BTreeSet::new(),
        }
    }

    /// Tools whose approvals must carry a signed copy of the payload.
    #[must_use]
    pub fn with_artifact_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifact_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    fn check_signer(&self, action: &Action, signer: &PublicKey) -> ActionResult<()> {
        let signer = signer.to_hex();
        let trusted = if self.trusted.is_empty() {
            signer == action.requester
        } else {
            self.trusted.contains(&signer)
        };
        if trusted {
            Ok(())
        } else {
            warn!(action_id = %action.id, signer = %signer, "approval from untrusted signer");
            Err(ActionError::Validation("Approval signer is not trusted".into()))
        }
    }

    fn check_final_artifact(&self, action: &Action, event: &SignedEvent) -> ActionResult<()> {
        event
            .verify()
            .map_err(|_| ActionError::Validation("Invalid final artifact signature".into()))?;

        let args = &action.args;
        let mismatch = |field: &str| {
            ActionError::Validation(format!("Final artifact mismatch on {field}"))
        };
        if args.get("kind").and_then(Value::as_u64) != Some(u64::from(event.kind)) {
            return Err(mismatch("kind"));
        }
        if args.get("content").and_then(Value::as_str) != Some(event.content.as_str()) {
            return Err(mismatch("content"));
        }
        let tags = serde_json::to_value(&event.tags).map_err(|e| ActionError::Internal(e.to_string()))?;
        if args.get("tags") != Some(&tags) {
            return Err(mismatch("tags"));
        }
        if args.get("created_at").and_then(Value::as_i64) != Some(event.created_at) {
            return Err(mismatch("created_at"));
        }
        if args.get("actor").and_then(Value::as_str) != Some(event.signer.to_hex().as_str()) {
            return Err(mismatch("actor"));
        }
        Ok(())
    }
}

impl ApprovalVerifier for SignedEventVerifier {
    fn name(&self) -> &'static str {
        "signed"
    }

    fn verify(&self, action: &Action, artifact: &ApprovalArtifact) -> ActionResult<()> {
        let ApprovalArtifact::Signed {
            approval,
            final_artifact,
        } = artifact
        else {
            return Err(ActionError::Validation(
                "A signed approval event is required".into(),
            ));
        };

        if approval.kind != APPROVAL_KIND {
            return Err(ActionError::Validation(format!(
                "Approval event must have kind {APPROVAL_KIND}"
            )));
        }
        approval
            .verify()
            .map_err(|_| ActionError::Validation("Invalid approval signature".into()))?;
        self.check_signer(action, &approval.signer)?;

        let claim: ApprovalClaim = serde_json::from_str(&approval.content)
            .map_err(|_| ActionError::Validation("Malformed approval content".into()))?;
        if claim != ApprovalClaim::for_action(action) {
            return Err(ActionError::Validation(
                "Approval does not match action".into(),
            ));
        }

        match (self.artifact_tools.contains(&action.tool), final_artifact) {
            (true, Some(event)) => self.check_final_artifact(action, event),
            (true, None) => Err(ActionError::Validation(format!(
                "A signed final artifact is required for {}",
                action.tool
            ))),
            (false, Some(_)) => Err(ActionError::Validation(format!(
                "{} does not take a final artifact",
                action.tool
            ))),
            (false, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionStatus;
    use chrono::Utc;
    use serde_json::json;
    use warrant_crypto::KeyPair;

    fn action_for(tool: &str, args: Value, requester: &str) -> Action {
        Action {
            id: "a1".into(),
            tool: tool.into(),
            action_hash: Action::compute_hash(tool, &args),
            args,
            requester: requester.into(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            status: ActionStatus::Proposed,
            approval_id: None,
            approval_expires_at: None,
            execution_started_at: None,
            executed_at: None,
        }
    }

    fn approval(kp: &KeyPair, action: &Action) -> SignedEvent {
        let content = ApprovalClaim::for_action(action).to_content().unwrap();
        SignedEvent::sign(kp, 1_700_000_000, APPROVAL_KIND, vec![], content)
    }

    fn broadcast(kp: &KeyPair) -> Action {
        action_for(
            "broadcast.publish",
            json!({
                "content": "hello",
                "kind": 1,
                "tags": [],
                "destinations": ["wss://a"],
                "created_at": 1_700_000_000,
                "actor": kp.export_public_key().to_hex(),
            }),
            &kp.export_public_key().to_hex(),
        )
    }

    fn signed_verifier() -> SignedEventVerifier {
        SignedEventVerifier::new(Vec::<PublicKey>::new()).with_artifact_tools(["broadcast.publish"])
    }

    #[test]
    fn test_token_verifier_accepts_only_tokens() {
        let kp = KeyPair::generate();
        let action = action_for("workspace.write_file", json!({}), "agent");
        assert!(TokenApprovalVerifier.verify(&action, &ApprovalArtifact::Token).is_ok());

        let signed = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: None,
        };
        assert!(TokenApprovalVerifier.verify(&action, &signed).is_err());
    }

    #[test]
    fn test_requester_key_approves_when_no_trusted_set() {
        let kp = KeyPair::generate();
        let action = action_for("workspace.write_file", json!({"path": "x"}), &kp.export_public_key().to_hex());
        let artifact = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: None,
        };
        assert!(signed_verifier().verify(&action, &artifact).is_ok());

        let stranger = KeyPair::generate();
        let artifact = ApprovalArtifact::Signed {
            approval: approval(&stranger, &action),
            final_artifact: None,
        };
        assert!(signed_verifier().verify(&action, &artifact).is_err());
    }

    #[test]
    fn test_trusted_set_overrides_requester() {
        let approver = KeyPair::generate();
        let action = action_for("workspace.write_file", json!({"path": "x"}), "agent");
        let verifier = SignedEventVerifier::new([approver.export_public_key()]);
        let artifact = ApprovalArtifact::Signed {
            approval: approval(&approver, &action),
            final_artifact: None,
        };
        assert!(verifier.verify(&action, &artifact).is_ok());
    }

    #[test]
    fn test_approval_bound_to_current_hash() {
        let kp = KeyPair::generate();
        let mut action = action_for("workspace.write_file", json!({"path": "x"}), &kp.export_public_key().to_hex());
        let artifact = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: None,
        };
        action.args = json!({"path": "y"});
        let err = signed_verifier().verify(&action, &artifact).unwrap_err();
        assert_eq!(err.to_string(), "Approval does not match action");
    }

    #[test]
    fn test_tampered_approval_rejected() {
        let kp = KeyPair::generate();
        let action = action_for("workspace.write_file", json!({}), &kp.export_public_key().to_hex());
        let mut event = approval(&kp, &action);
        event.created_at = event.created_at.saturating_add(1);
        let artifact = ApprovalArtifact::Signed {
            approval: event,
            final_artifact: None,
        };
        let err = signed_verifier().verify(&action, &artifact).unwrap_err();
        assert_eq!(err.to_string(), "Invalid approval signature");
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let kp = KeyPair::generate();
        let action = action_for("workspace.write_file", json!({}), &kp.export_public_key().to_hex());
        let content = ApprovalClaim::for_action(&action).to_content().unwrap();
        let artifact = ApprovalArtifact::Signed {
            approval: SignedEvent::sign(&kp, 0, 1, vec![], content),
            final_artifact: None,
        };
        assert!(signed_verifier().verify(&action, &artifact).is_err());
    }

    #[test]
    fn test_final_artifact_required_and_compared() {
        let kp = KeyPair::generate();
        let action = broadcast(&kp);

        let missing = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: None,
        };
        assert!(signed_verifier().verify(&action, &missing).is_err());

        let matching = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: Some(SignedEvent::sign(&kp, 1_700_000_000, 1, vec![], "hello")),
        };
        assert!(signed_verifier().verify(&action, &matching).is_ok());

        for (created_at, kind, tags, content, field) in [
            (1_700_000_000, 1, vec![], "hullo", "content"),
            (1_700_000_001, 1, vec![], "hello", "created_at"),
            (1_700_000_000, 7, vec![], "hello", "kind"),
            (1_700_000_000, 1, vec![vec!["t".to_string()]], "hello", "tags"),
        ] {
            let artifact = ApprovalArtifact::Signed {
                approval: approval(&kp, &action),
                final_artifact: Some(SignedEvent::sign(&kp, created_at, kind, tags, content)),
            };
            let err = signed_verifier().verify(&action, &artifact).unwrap_err();
            assert_eq!(err.to_string(), format!("Final artifact mismatch on {field}"));
        }
    }

    #[test]
    fn test_final_artifact_signed_by_someone_else_rejected() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let action = broadcast(&kp);
        let artifact = ApprovalArtifact::Signed {
            approval: approval(&kp, &action),
            final_artifact: Some(SignedEvent::sign(&other, 1_700_000_000, 1, vec![], "hello")),
        };
        let err = signed_verifier().verify(&action, &artifact).unwrap_err();
        assert_eq!(err.to_string(), "Final artifact mismatch on actor");
    }

    #[test]
    fn test_artifact_serde_shape() {
        let value = serde_json::to_value(ApprovalArtifact::Token).unwrap();
        assert_eq!(value, json!({"type": "token"}));
    }
}
