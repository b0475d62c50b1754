//! Broadcast tool and the publisher seam it fans out through.
//!
//! Delivery to destinations runs concurrently up to a fixed limit, and the
//! per-destination results come back in the order the destinations were
//! listed. The default [`NullPublisher`] reaches nothing and reports every
//! destination as failed.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use warrant_crypto::action_hash;

use crate::{ExecutionContext, ProposalContext, RiskTier, Tool, ToolError, ToolResult, to_json};

/// Delivery failure for one destination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PublishError(pub String);

/// Delivers an artifact to a single destination.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `artifact` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] describing why delivery failed.
    async fn publish(&self, artifact: &Value, destination: &str) -> Result<(), PublishError>;
}

/// Publisher used when no transport is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

#[async_trait::async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, _artifact: &Value, _destination: &str) -> Result<(), PublishError> {
        Err(PublishError("publisher not installed".into()))
    }
}

/// Outcome for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Destination address.
    pub destination: String,
    /// Whether delivery succeeded.
    pub success: bool,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deliver `artifact` to every destination with at most `max_concurrency`
/// deliveries in flight. Results keep the input order.
pub async fn fan_out(
    publisher: &dyn Publisher,
    artifact: &Value,
    destinations: &[String],
    max_concurrency: usize,
) -> Vec<PublishResult> {
    let deliveries: Vec<_> = destinations
        .iter()
        .map(|destination| publish_one(publisher, artifact, destination))
        .collect();
    futures::stream::iter(deliveries)
        .buffered(max_concurrency.max(1))
        .collect()
        .await
}

async fn publish_one(
    publisher: &dyn Publisher,
    artifact: &Value,
    destination: &String,
) -> PublishResult {
    match publisher.publish(artifact, destination).await {
        Ok(()) => PublishResult {
            destination: destination.clone(),
            success: true,
            error: None,
        },
        Err(e) => {
            warn!(destination = %destination, error = %e, "publish failed");
            PublishResult {
                destination: destination.clone(),
                success: false,
                error: Some(e.0),
            }
        },
    }
}

/// Limits applied to broadcast proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPolicy {
    /// Allowed destinations, also the default set.
    pub destinations: Vec<String>,
    /// Maximum content length in characters.
    pub max_content_len: usize,
    /// Maximum deliveries in flight.
    pub max_concurrency: usize,
}

impl Default for BroadcastPolicy {
    fn default() -> Self {
        Self {
            destinations: vec!["wss://relay.damus.io".into(), "wss://nos.lol".into()],
            max_content_len: 1000,
            max_concurrency: 4,
        }
    }
}

fn default_kind() -> u32 {
    1
}

/// Arguments for [`BroadcastTool`].
///
/// Omitted fields are filled at proposal time, so the stored arguments
/// always carry concrete values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastArgs {
    /// Text to publish.
    pub content: String,
    /// Artifact kind.
    #[serde(default = "default_kind")]
    pub kind: u32,
    /// Ordered tag lists.
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Target destinations. Empty means the configured set.
    #[serde(default)]
    pub destinations: Vec<String>,
    /// Unix timestamp of the artifact. Zero means proposal time.
    #[serde(default)]
    pub created_at: i64,
    /// Identity expected to sign the artifact. Empty means the requester.
    #[serde(default)]
    pub actor: String,
}

impl BroadcastArgs {
    /// The unsigned payload published when no signed artifact is supplied.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({
            "type": "broadcast.publish",
            "kind": self.kind,
            "content": self.content,
            "tags": self.tags,
            "created_at": self.created_at,
            "actor": self.actor,
        })
    }
}

/// `broadcast.publish`: PRIVILEGED, publishes a short text artifact.
#[derive(Clone)]
pub struct BroadcastTool {
    publisher: Arc<dyn Publisher>,
    policy: BroadcastPolicy,
}

impl std::fmt::Debug for BroadcastTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTool")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl BroadcastTool {
    /// Create the tool with a publisher and limits.
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, policy: BroadcastPolicy) -> Self {
        Self { publisher, policy }
    }

    /// The configured limits.
    #[must_use]
    pub fn policy(&self) -> &BroadcastPolicy {
        &self.policy
    }
}

#[async_trait::async_trait]
impl Tool for BroadcastTool {
    type Args = BroadcastArgs;

    fn name(&self) -> &'static str {
        "broadcast.publish"
    }

    fn description(&self) -> &'static str {
        "Publish a short text artifact to allowlisted destinations."
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Privileged
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "minLength": 1,
                    "maxLength": self.policy.max_content_len
                },
                "kind": { "type": "integer", "default": 1 },
                "tags": {
                    "type": "array",
                    "items": { "type": "array", "items": { "type": "string" } }
                },
                "destinations": {
                    "type": "array",
                    "items": { "type": "string", "enum": self.policy.destinations }
                },
                "created_at": { "type": "integer" },
                "actor": { "type": "string" }
            },
            "required": ["content"],
            "additionalProperties": false
        })
    }

    fn publishes_artifact(&self) -> bool {
        true
    }

    fn normalize(&self, mut args: BroadcastArgs, ctx: &ProposalContext) -> ToolResult<BroadcastArgs> {
        if args.destinations.is_empty() {
            args.destinations.clone_from(&self.policy.destinations);
        }
        if args.created_at == 0 {
            args.created_at = ctx.now.timestamp();
        }
        if args.actor.is_empty() {
            args.actor.clone_from(&ctx.requester);
        }
        Ok(args)
    }

    fn validate(&self, args: &BroadcastArgs) -> ToolResult<()> {
        if args.content.is_empty() {
            return Err(ToolError::InvalidArguments(
                "content must not be empty".into(),
            ));
        }
        let len = args.content.chars().count();
        if len > self.policy.max_content_len {
            return Err(ToolError::InvalidArguments(format!(
                "content is {len} characters, limit is {}",
                self.policy.max_content_len
            )));
        }
        if args.destinations.is_empty() {
            return Err(ToolError::InvalidArguments(
                "no destinations configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for destination in &args.destinations {
            if !self.policy.destinations.contains(destination) {
                return Err(ToolError::InvalidArguments(format!(
                    "destination not allowed: {destination}"
                )));
            }
            if !seen.insert(destination.as_str()) {
                return Err(ToolError::InvalidArguments(format!(
                    "destination listed twice: {destination}"
                )));
            }
        }
        Ok(())
    }

    fn preview(&self, args: &BroadcastArgs) -> String {
        format!(
            "Publish to {} destination(s): {}",
            args.destinations.len(),
            args.content
        )
    }

    async fn execute(&self, args: BroadcastArgs, ctx: &ExecutionContext) -> ToolResult<Value> {
        let (artifact_id, artifact) = match &ctx.final_artifact {
            Some(event) => (event.id.clone(), to_json(event)?),
            None => {
                let payload = args.payload();
                (action_hash(&payload), payload)
            },
        };

        debug!(
            action_id = %ctx.action_id,
            artifact_id = %artifact_id,
            destinations = args.destinations.len(),
            "publishing artifact"
        );
        let results = fan_out(
            self.publisher.as_ref(),
            &artifact,
            &args.destinations,
            self.policy.max_concurrency,
        )
        .await;

        Ok(json!({
            "artifact_id": artifact_id,
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Mutex, Notify};
    use warrant_crypto::{KeyPair, SignedEvent};

    /// Records deliveries; `slow` waits until `fast` has been delivered.
    #[derive(Default)]
    struct OrderedPublisher {
        delivered: Mutex<Vec<String>>,
        released: Notify,
    }

    #[async_trait::async_trait]
    impl Publisher for OrderedPublisher {
        async fn publish(&self, _artifact: &Value, destination: &str) -> Result<(), PublishError> {
            if destination == "slow" {
                self.released.notified().await;
            }
            self.delivered.lock().await.push(destination.to_string());
            if destination == "fast" {
                self.released.notify_one();
            }
            if destination == "broken" {
                return Err(PublishError("connection refused".into()));
            }
            Ok(())
        }
    }

    fn destinations(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn tool(publisher: Arc<dyn Publisher>) -> BroadcastTool {
        BroadcastTool::new(
            publisher,
            BroadcastPolicy {
                destinations: destinations(&["wss://a", "wss://b"]),
                max_content_len: 10,
                max_concurrency: 2,
            },
        )
    }

    fn ctx() -> ProposalContext {
        ProposalContext {
            requester: "alice".into(),
            now: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn args(content: &str) -> BroadcastArgs {
        serde_json::from_value(json!({ "content": content })).unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_keeps_input_order() {
        let publisher = OrderedPublisher::default();
        let results = fan_out(
            &publisher,
            &json!({}),
            &destinations(&["slow", "fast", "broken"]),
            2,
        )
        .await;

        // "slow" can only finish after "fast", so both were in flight together.
        let delivered = publisher.delivered.lock().await.clone();
        assert_eq!(delivered.len(), 3);
        assert_eq!(delivered[0], "fast");
        let order: Vec<_> = results.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast", "broken"]);
        assert!(results[0].success && results[1].success);
        assert_eq!(results[2].error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_null_publisher_reports_failures() {
        let results = fan_out(&NullPublisher, &json!({}), &destinations(&["wss://a"]), 4).await;
        assert_eq!(
            results,
            vec![PublishResult {
                destination: "wss://a".into(),
                success: false,
                error: Some("publisher not installed".into()),
            }]
        );
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let tool = tool(Arc::new(NullPublisher));
        let args = tool.normalize(args("hi"), &ctx()).unwrap();
        assert_eq!(args.kind, 1);
        assert!(args.tags.is_empty());
        assert_eq!(args.destinations, destinations(&["wss://a", "wss://b"]));
        assert_eq!(args.created_at, 1_700_000_000);
        assert_eq!(args.actor, "alice");
    }

    #[test]
    fn test_validation_limits() {
        let tool = tool(Arc::new(NullPublisher));
        let ok = tool.normalize(args("0123456789"), &ctx()).unwrap();
        assert!(tool.validate(&ok).is_ok());

        let long = tool.normalize(args("0123456789x"), &ctx()).unwrap();
        assert!(tool.validate(&long).unwrap_err().is_validation());

        let empty = tool.normalize(args(""), &ctx()).unwrap();
        assert!(tool.validate(&empty).unwrap_err().is_validation());

        let mut foreign = ok.clone();
        foreign.destinations = destinations(&["wss://evil"]);
        assert!(tool.validate(&foreign).is_err());

        let mut doubled = ok;
        doubled.destinations = destinations(&["wss://a", "wss://a"]);
        assert!(tool.validate(&doubled).is_err());
    }

    #[test]
    fn test_content_limit_counts_characters() {
        let tool = tool(Arc::new(NullPublisher));
        let args = tool.normalize(args("éééééééééé"), &ctx()).unwrap();
        assert!(tool.validate(&args).is_ok());
    }

    #[test]
    fn test_preview() {
        let tool = tool(Arc::new(NullPublisher));
        let args = tool.normalize(args("hi"), &ctx()).unwrap();
        assert_eq!(tool.preview(&args), "Publish to 2 destination(s): hi");
    }

    #[tokio::test]
    async fn test_execute_prefers_signed_artifact() {
        let tool = tool(Arc::new(NullPublisher));
        let args = tool.normalize(args("hi"), &ctx()).unwrap();

        let unsigned = tool
            .execute(args.clone(), &ExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(unsigned["artifact_id"], action_hash(&args.payload()));
        assert_eq!(unsigned["results"].as_array().unwrap().len(), 2);

        let kp = KeyPair::generate();
        let event = SignedEvent::sign(&kp, args.created_at, 1, vec![], "hi");
        let signed = tool
            .execute(
                args,
                &ExecutionContext {
                    action_id: "a1".into(),
                    final_artifact: Some(event.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(signed["artifact_id"], event.id);
    }
}
