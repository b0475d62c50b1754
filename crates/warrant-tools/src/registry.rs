//! Tool registry.
//!
//! Tools are registered once while the gateway is assembled. The finished
//! [`ToolRegistry`] has no mutating methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{
    ExecutionContext, ProposalContext, RiskTier, Tool, ToolError, ToolResult, parse_args, to_json,
};

/// Object-safe view of a [`Tool`], working on raw JSON.
#[async_trait::async_trait]
trait ErasedTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn risk_tier(&self) -> RiskTier;
    fn input_schema(&self) -> Value;
    fn publishes_artifact(&self) -> bool;
    fn construct(&self, args: &Value, ctx: &ProposalContext) -> ToolResult<Value>;
    fn check(&self, args: &Value) -> ToolResult<()>;
    fn preview(&self, args: &Value) -> ToolResult<String>;
    async fn execute(&self, args: &Value, ctx: &ExecutionContext) -> ToolResult<Value>;
}

#[async_trait::async_trait]
impl<T: Tool> ErasedTool for T {
    fn name(&self) -> &'static str {
        Tool::name(self)
    }

    fn description(&self) -> &'static str {
        Tool::description(self)
    }

    fn risk_tier(&self) -> RiskTier {
        Tool::risk_tier(self)
    }

    fn input_schema(&self) -> Value {
        Tool::input_schema(self)
    }

    fn publishes_artifact(&self) -> bool {
        Tool::publishes_artifact(self)
    }

    fn construct(&self, args: &Value, ctx: &ProposalContext) -> ToolResult<Value> {
        let parsed: T::Args = parse_args(Tool::name(self), args)?;
        let normalized = Tool::normalize(self, parsed, ctx)?;
        Tool::validate(self, &normalized)?;
        to_json(&normalized)
    }

    fn check(&self, args: &Value) -> ToolResult<()> {
        let parsed: T::Args = parse_args(Tool::name(self), args)?;
        Tool::validate(self, &parsed)
    }

    fn preview(&self, args: &Value) -> ToolResult<String> {
        let parsed: T::Args = parse_args(Tool::name(self), args)?;
        Ok(Tool::preview(self, &parsed))
    }

    async fn execute(&self, args: &Value, ctx: &ExecutionContext) -> ToolResult<Value> {
        let parsed: T::Args = parse_args(Tool::name(self), args)?;
        Tool::validate(self, &parsed)?;
        Tool::execute(self, parsed, ctx).await
    }
}

/// Everything the gateway knows about one registered tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    inner: Arc<dyn ErasedTool>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name())
            .field("risk_tier", &self.risk_tier())
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Wrap a typed tool.
    #[must_use]
    pub fn new<T: Tool>(tool: T) -> Self {
        Self {
            inner: Arc::new(tool),
        }
    }

    /// Registry name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.inner.description()
    }

    /// Risk tier.
    #[must_use]
    pub fn risk_tier(&self) -> RiskTier {
        self.inner.risk_tier()
    }

    /// JSON schema of the arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    /// Whether execution publishes an external artifact.
    #[must_use]
    pub fn publishes_artifact(&self) -> bool {
        self.inner.publishes_artifact()
    }

    /// Build canonical arguments from raw proposal input.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the input does not fit the argument
    /// type or breaks a tool rule.
    pub fn construct(&self, args: &Value, ctx: &ProposalContext) -> ToolResult<Value> {
        self.inner.construct(args, ctx)
    }

    /// Re-check stored arguments without running anything.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the arguments are no longer acceptable.
    pub fn check(&self, args: &Value) -> ToolResult<()> {
        self.inner.check(args)
    }

    /// Preview text for stored arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the arguments do not parse.
    pub fn preview(&self, args: &Value) -> ToolResult<String> {
        self.inner.preview(args)
    }

    /// Parse, re-check and run.
    ///
    /// # Errors
    ///
    /// Returns whatever the tool's executor returns.
    pub async fn execute(&self, args: &Value, ctx: &ExecutionContext) -> ToolResult<Value> {
        self.inner.execute(args, ctx).await
    }
}

/// Collects tools before the registry is frozen.
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<&'static str, ToolDescriptor>,
}

impl ToolRegistryBuilder {
    /// Add a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the name is already taken.
    pub fn register<T: Tool>(mut self, tool: T) -> ToolResult<Self> {
        let descriptor = ToolDescriptor::new(tool);
        let name = descriptor.name();
        if self.tools.contains_key(name) {
            return Err(ToolError::InvalidArguments(format!(
                "tool registered twice: {name}"
            )));
        }
        debug!(tool = name, tier = %descriptor.risk_tier(), "tool registered");
        self.tools.insert(name, descriptor);
        Ok(self)
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

/// Immutable map from tool name to descriptor.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Look up a tool.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Whether a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
