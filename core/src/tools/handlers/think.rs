use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

/// Lets the model write down intermediate reasoning. No side effects.
pub struct ThinkTool;

#[derive(Debug, Deserialize)]
struct ThinkArgs {
  prompt: String,
}

impl ToolArgs for ThinkArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("prompt", &self.prompt)
  }
}

#[async_trait]
impl Tool for ThinkTool {
  fn name(&self) -> &'static str {
    "think"
  }

  fn description(&self) -> &'static str {
    "Record step-by-step reasoning before acting. The prompt is returned unchanged."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![("prompt", JsonSchema::string("The reasoning to record"))],
      &["prompt"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<ThinkArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, _ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: ThinkArgs = decode(self.name(), input)?;
    Ok(json!({ "reasoning": args.prompt }))
  }

  fn is_read_only(&self) -> bool {
    true
  }

  fn requires_permission(&self, _input: &ToolInput) -> bool {
    false
  }
}
