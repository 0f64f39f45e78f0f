use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::model::{ToolDeclaration, ToolInput};
use crate::tools::context::{ToolContext, ToolError};
use crate::tools::spec::JsonSchema;

/// A named, self-describing capability the model can invoke.
///
/// Instances are created fresh per invocation by the registry, so
/// implementations hold no state between calls.
#[async_trait]
pub trait Tool: Send + Sync {
  fn name(&self) -> &'static str;

  fn description(&self) -> &'static str;

  fn argument_schema(&self) -> JsonSchema;

  /// Reject malformed input without side effects.
  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError>;

  /// Run the tool. Input that fails validation yields
  /// [`ToolError::Validation`] here too.
  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError>;

  fn is_read_only(&self) -> bool;

  /// Advisory: whether a host should ask before running this call.
  fn requires_permission(&self, _input: &ToolInput) -> bool {
    true
  }

  fn declaration(&self) -> ToolDeclaration {
    ToolDeclaration {
      name: self.name().to_string(),
      description: self.description().to_string(),
      parameters: self.argument_schema().to_value(),
    }
  }
}

pub type ToolFactory = Arc<dyn Fn() -> Box<dyn Tool> + Send + Sync>;

/// Name-keyed factory table. Populate it before sharing; lookups through
/// `&self` are then safe from any number of sessions.
#[derive(Clone, Default)]
pub struct ToolRegistry {
  factories: BTreeMap<String, ToolFactory>,
}

impl ToolRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry holding every built-in tool.
  pub fn with_default_tools() -> Self {
    let mut registry = Self::new();
    crate::tools::handlers::register_builtin_tools(&mut registry);
    registry
  }

  pub fn register_tool<T, F>(&mut self, factory: F)
  where
    T: Tool + 'static,
    F: Fn() -> T + Send + Sync + 'static,
  {
    let name = factory().name().to_string();
    let factory: ToolFactory = Arc::new(move || -> Box<dyn Tool> { Box::new(factory()) });
    if self.factories.insert(name.clone(), factory).is_some() {
      warn!(tool = %name, "replaced existing tool registration");
    }
  }

  /// Fresh instance of the named tool.
  pub fn get_tool(&self, name: &str) -> Option<Box<dyn Tool>> {
    self.factories.get(name).map(|factory| factory())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    self.factories.keys().map(String::as_str).collect()
  }

  pub fn get_all_tools(&self) -> Vec<Box<dyn Tool>> {
    self.factories.values().map(|factory| factory()).collect()
  }

  pub fn get_read_only_tools(&self) -> Vec<Box<dyn Tool>> {
    self
      .get_all_tools()
      .into_iter()
      .filter(|tool| tool.is_read_only())
      .collect()
  }

  /// A new registry restricted to read-only tools.
  pub fn read_only(&self) -> Self {
    let factories = self
      .factories
      .iter()
      .filter(|(_, factory)| factory().is_read_only())
      .map(|(name, factory)| (name.clone(), Arc::clone(factory)))
      .collect();
    Self { factories }
  }

  pub fn declarations(&self) -> Vec<ToolDeclaration> {
    self
      .get_all_tools()
      .iter()
      .map(|tool| tool.declaration())
      .collect()
  }

  pub fn len(&self) -> usize {
    self.factories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.is_empty()
  }
}

impl fmt::Debug for ToolRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ToolRegistry")
      .field("tools", &self.names())
      .finish()
  }
}
