//! Model layer types
//!
//! Conversation history, tool calls and the request/response shapes exchanged
//! with a [`ModelClient`](super::ModelClient). Vendor wire formats are mapped
//! from these by client implementations.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ModelError;

/// Untyped tool arguments as produced by the model.
pub type ToolInput = serde_json::Map<String, Value>;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
  Tool,
}

/// Message body: plain text or a structured payload (tool output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
  Text(String),
  Structured(Value),
}

impl MessageContent {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      MessageContent::Text(text) => Some(text),
      MessageContent::Structured(_) => None,
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      MessageContent::Text(text) => text.is_empty(),
      MessageContent::Structured(value) => value.is_null(),
    }
  }
}

impl From<String> for MessageContent {
  fn from(value: String) -> Self {
    MessageContent::Text(value)
  }
}

impl From<&str> for MessageContent {
  fn from(value: &str) -> Self {
    MessageContent::Text(value.to_string())
  }
}

impl From<Value> for MessageContent {
  fn from(value: Value) -> Self {
    MessageContent::Structured(value)
  }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub role: Role,

  pub content: MessageContent,

  /// Tool calls requested by an assistant message, in model order
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tool_calls: Vec<ToolCall>,

  /// For tool messages: the call this result answers
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_call_id: Option<String>,

  /// For tool messages: the tool that produced the result
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl Message {
  fn new(role: Role, content: MessageContent) -> Self {
    Self {
      role,
      content,
      tool_calls: Vec::new(),
      tool_call_id: None,
      name: None,
    }
  }

  pub fn system(content: impl Into<String>) -> Self {
    Self::new(Role::System, MessageContent::Text(content.into()))
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::new(Role::User, MessageContent::Text(content.into()))
  }

  pub fn assistant(content: impl Into<MessageContent>) -> Self {
    Self::new(Role::Assistant, content.into())
  }

  /// Assistant message that also records the tool calls it requested.
  pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
    Self {
      tool_calls,
      ..Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }
  }

  pub fn tool(call_id: impl Into<String>, tool_name: impl Into<String>, output: Value) -> Self {
    Self {
      tool_call_id: Some(call_id.into()),
      name: Some(tool_name.into()),
      ..Self::new(Role::Tool, MessageContent::Structured(output))
    }
  }

  pub fn text(&self) -> Option<&str> {
    self.content.as_text()
  }
}

/// A model-issued request to run a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
  pub id: String,
  pub tool_name: String,
  pub input: ToolInput,
}

impl ToolCall {
  pub fn new(id: impl Into<String>, tool_name: impl Into<String>, input: ToolInput) -> Self {
    Self {
      id: id.into(),
      tool_name: tool_name.into(),
      input,
    }
  }

  /// Build a call from the raw JSON argument string most vendors send.
  /// An empty string counts as `{}`.
  pub fn from_json_arguments(
    id: impl Into<String>,
    tool_name: impl Into<String>,
    arguments: &str,
  ) -> Result<Self, ModelError> {
    let tool_name = tool_name.into();
    let input = if arguments.trim().is_empty() {
      ToolInput::new()
    } else {
      match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
          return Err(ModelError::Protocol(format!(
            "arguments for {tool_name} must be a JSON object, got {other}"
          )));
        }
        Err(err) => {
          return Err(ModelError::Protocol(format!(
            "invalid arguments for {tool_name}: {err}"
          )));
        }
      }
    };
    Ok(Self::new(id, tool_name, input))
  }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
  pub prompt_tokens: u32,
  pub completion_tokens: u32,
  pub total_tokens: u32,
  /// Provider-reported cost, when known
  #[serde(default)]
  pub cost: f64,
}

impl AddAssign for Usage {
  fn add_assign(&mut self, other: Self) {
    // Counts come from the provider; clamp rather than overflow.
    self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
    self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
    self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    self.cost += other.cost;
  }
}

/// Complete model response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
  pub content: String,
  #[serde(default)]
  pub tool_calls: Vec<ToolCall>,
  #[serde(default)]
  pub usage: Usage,
  #[serde(default)]
  pub finish_reason: Option<String>,
}

impl Response {
  pub fn has_tool_calls(&self) -> bool {
    !self.tool_calls.is_empty()
  }
}

/// One increment of a streamed response.
#[derive(Debug, Clone, Default)]
pub struct ResponseChunk {
  pub content: String,
  pub tool_calls: Vec<ToolCall>,
  /// Terminal marker; set on exactly one chunk per stream
  pub is_done: bool,
  pub error: Option<ModelError>,
  pub usage: Option<Usage>,
  pub finish_reason: Option<String>,
}

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
  pub name: String,
  pub description: String,
  /// JSON schema of the accepted arguments
  pub parameters: Value,
}

/// Everything a client needs for one round-trip.
#[derive(Debug, Clone)]
pub struct ModelRequest {
  pub messages: Vec<Message>,
  pub tools: Vec<ToolDeclaration>,
  pub max_tokens: u32,
  pub temperature: f32,
}
