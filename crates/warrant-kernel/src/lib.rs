//! Warrant Kernel - assembles the approval gateway from configuration.
//!
//! The kernel owns no policy of its own. It opens the configured store,
//! prepares the workspace sandbox, registers the built-in tools, selects an
//! approval verifier and hands all of it to one [`ActionService`].
//!
//! # Example
//!
//! ```
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! use serde_json::json;
//! use warrant_config::Config;
//! use warrant_kernel::Kernel;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut config = Config::default();
//! config.storage.backend = "memory".into();
//! config.workspace.root = dir.path().to_path_buf();
//!
//! let kernel = Kernel::build(config).unwrap();
//! let action = kernel
//!     .service()
//!     .propose("workspace.write_file", json!({"path": "a.txt", "content": "hi"}), "agent")
//!     .await
//!     .unwrap();
//! assert_eq!(action.status.as_str(), "PROPOSED");
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bridge;
mod error;

use std::sync::Arc;

use tracing::info;
use warrant_approval::{
    ActionService, AgentPlanner, Clock, Ledger, Planner, RuleBasedPlanner, SystemClock,
};
use warrant_audit::AuditLog;
use warrant_config::Config;
use warrant_storage::KvStore;
use warrant_tools::{NullPublisher, Publisher};

pub use error::{KernelError, KernelResult};

/// A booted gateway.
#[derive(Debug, Clone)]
pub struct Kernel {
    config: Config,
    service: Arc<ActionService>,
    planner: AgentPlanner,
}

impl Kernel {
    /// Boot with default collaborators: the configured store, the system
    /// clock, a publisher that always fails and the rule-based planner.
    ///
    /// # Errors
    ///
    /// See [`KernelBuilder::build`].
    pub fn build(config: Config) -> KernelResult<Self> {
        KernelBuilder::new(config).build()
    }

    /// Start a builder for replacing individual collaborators.
    #[must_use]
    pub fn builder(config: Config) -> KernelBuilder {
        KernelBuilder::new(config)
    }

    /// Install logging as configured.
    ///
    /// # Errors
    ///
    /// Returns a telemetry error for a bad filter or if logging is already
    /// installed.
    pub fn init_logging(config: &Config) -> KernelResult<()> {
        warrant_telemetry::setup_logging(&bridge::log_config(&config.logging)?)?;
        Ok(())
    }

    /// The configuration this kernel was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The action lifecycle service.
    #[must_use]
    pub fn service(&self) -> &Arc<ActionService> {
        &self.service
    }

    /// The planner loop that proposes on an agent's behalf.
    #[must_use]
    pub fn planner(&self) -> &AgentPlanner {
        &self.planner
    }
}

/// Builds a [`Kernel`], optionally overriding its collaborators.
pub struct KernelBuilder {
    config: Config,
    store: Option<Arc<dyn KvStore>>,
    clock: Option<Arc<dyn Clock>>,
    publisher: Option<Arc<dyn Publisher>>,
    planner: Option<Arc<dyn Planner>>,
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.store.is_some())
            .field("clock", &self.clock)
            .field("custom_publisher", &self.publisher.is_some())
            .field("planner", &self.planner)
            .finish()
    }
}

impl KernelBuilder {
    /// Builder with every collaborator taken from `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            publisher: None,
            planner: None,
        }
    }

    /// Use `store` instead of opening the configured backend.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Deliver broadcasts through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Plan with `planner` instead of the rule-based one.
    #[must_use]
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Assemble the gateway.
    ///
    /// # Errors
    ///
    /// Returns a [`KernelError`] if the configuration is invalid, the store
    /// cannot be opened or the workspace root cannot be prepared.
    pub fn build(self) -> KernelResult<Kernel> {
        let Self {
            config,
            store,
            clock,
            publisher,
            planner,
        } = self;
        config.validate()?;

        let store = match store {
            Some(store) => store,
            None => bridge::open_store(&config.storage)?,
        };
        let publisher = publisher.unwrap_or_else(|| Arc::new(NullPublisher));
        let registry = bridge::tool_registry(&config, publisher)?;
        let verifier = bridge::approval_verifier(&config.approval, &registry)?;
        let ttls = bridge::action_ttls(&config.actions)?;

        let service = Arc::new(ActionService::new(
            Ledger::new(Arc::clone(&store))?,
            AuditLog::new(store),
            Arc::new(registry),
            verifier,
            clock.unwrap_or_else(|| Arc::new(SystemClock)),
            ttls,
        ));
        let planner = AgentPlanner::new(
            planner.unwrap_or_else(|| Arc::new(RuleBasedPlanner)),
            Arc::clone(&service),
        );

        info!(
            backend = %config.storage.backend,
            verifier = %config.approval.verifier,
            workspace = %config.workspace.root.display(),
            tools = service.registry().len(),
            "gateway ready"
        );

        Ok(Kernel {
            config,
            service,
            planner,
        })
    }
}
