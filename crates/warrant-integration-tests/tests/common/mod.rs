//! Shared harness for gateway integration tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tempfile::TempDir;
use warrant_approval::{ActionService, ManualClock};
use warrant_config::Config;
use warrant_crypto::KeyPair;
use warrant_kernel::Kernel;
use warrant_storage::{KvStore, MemoryKvStore};
use warrant_tools::{PublishError, Publisher};

/// Publisher that remembers every delivery and can be told to refuse
/// specific destinations.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    delivered: Mutex<Vec<(String, Value)>>,
    refuse: Vec<String>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    /// A publisher that refuses `destinations`.
    pub fn refusing(destinations: &[&str]) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            refuse: destinations.iter().map(|d| (*d).to_owned()).collect(),
        }
    }

    /// Every `(destination, artifact)` delivered so far.
    pub fn delivered(&self) -> Vec<(String, Value)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, artifact: &Value, destination: &str) -> Result<(), PublishError> {
        if self.refuse.iter().any(|d| d == destination) {
            return Err(PublishError(format!("{destination} refused the connection")));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((destination.to_owned(), artifact.clone()));
        Ok(())
    }
}

/// A gateway over an in-memory store, a temp workspace and a manual clock.
#[allow(dead_code)]
pub struct GatewayHarness {
    /// The assembled gateway.
    pub kernel: Kernel,
    /// The store behind the ledger and audit log.
    pub store: Arc<dyn KvStore>,
    /// Clock the service reads.
    pub clock: Arc<ManualClock>,
    /// Broadcast transport.
    pub publisher: Arc<RecordingPublisher>,
    /// Workspace root.
    pub workspace: PathBuf,
    _dir: TempDir,
}

#[allow(dead_code)]
impl GatewayHarness {
    /// Token approvals, default limits.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Signed approvals trusting exactly `signers`. No signers means the
    /// requester's own key approves.
    pub fn signed(signers: &[&KeyPair]) -> Self {
        let hexes: Vec<String> = signers
            .iter()
            .map(|k| k.export_public_key().to_hex())
            .collect();
        Self::with_config(move |config| {
            config.approval.verifier = "signed".into();
            config.approval.trusted_signers = hexes;
        })
    }

    /// Default configuration adjusted by `adjust`.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        Self::with_parts(adjust, RecordingPublisher::default())
    }

    /// Full control over configuration and publisher.
    pub fn with_parts(adjust: impl FnOnce(&mut Config), publisher: RecordingPublisher) -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        let workspace = dir.path().join("workspace");

        let mut config = Config::default();
        config.storage.backend = "memory".into();
        config.workspace.root.clone_from(&workspace);
        adjust(&mut config);

        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let publisher = Arc::new(publisher);
        let kernel = Kernel::builder(config)
            .with_store(Arc::clone(&store))
            .with_clock(clock.clone())
            .with_publisher(publisher.clone())
            .build()
            .expect("kernel should build");

        Self {
            kernel,
            store,
            clock,
            publisher,
            workspace,
            _dir: dir,
        }
    }

    /// The action service.
    pub fn service(&self) -> &Arc<ActionService> {
        self.kernel.service()
    }

    /// Path of `relative` inside the workspace.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.workspace.join(relative)
    }

    /// Edit the stored arguments of `action_id` behind the service's back.
    pub async fn tamper_args(&self, action_id: &str, edit: impl FnOnce(&mut Value)) {
        let bytes = self
            .store
            .get("actions", action_id)
            .await
            .unwrap()
            .expect("action row should exist");
        let mut row: Value = serde_json::from_slice(&bytes).unwrap();
        edit(&mut row["args"]);
        self.store
            .set("actions", action_id, serde_json::to_vec(&row).unwrap())
            .await
            .unwrap();
    }

    /// Event type names of the audit trail for `action_id`, oldest first.
    pub async fn trail(&self, action_id: &str) -> Vec<&'static str> {
        self.service()
            .audit(Some(action_id))
            .await
            .unwrap()
            .iter()
            .map(|e| e.event_type.as_str())
            .collect()
    }
}
