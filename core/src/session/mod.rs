//! Session
//!
//! Owns the conversation history and drives one query/tool cycle at a time.
//! A session is used sequentially by one caller; concurrent conversations
//! each get their own `Session`.

mod config;
mod phase;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{
  Message, MessageContent, ModelClient, ModelError, ModelRequest, Response, ResponseStream,
  ToolCall, ToolInput,
};
use crate::tools::{ToolContext, ToolError, ToolRegistry};

pub use config::SessionConfig;
pub use phase::SessionPhase;

/// Failures surfaced to the session's caller. Tool validation and execution
/// failures are not among them; those land in history as tool results.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("tool not found: {0}")]
  ToolNotFound(String),

  #[error(transparent)]
  Model(#[from] ModelError),

  #[error("operation cancelled")]
  Cancelled,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseResult {
  pub call_id: String,
  pub tool_name: String,
  pub input: ToolInput,
  pub output: Option<Value>,
  pub error: Option<ToolError>,
}

impl ToolUseResult {
  fn succeeded(call: &ToolCall, output: Value) -> Self {
    Self {
      call_id: call.id.clone(),
      tool_name: call.tool_name.clone(),
      input: call.input.clone(),
      output: Some(output),
      error: None,
    }
  }

  fn failed(call: &ToolCall, error: ToolError) -> Self {
    Self {
      call_id: call.id.clone(),
      tool_name: call.tool_name.clone(),
      input: call.input.clone(),
      output: None,
      error: Some(error),
    }
  }

  /// Result for a call the host refused to run.
  pub fn denied(call: &ToolCall, reason: impl Into<String>) -> Self {
    Self::failed(call, ToolError::PermissionDenied(reason.into()))
  }

  pub fn is_success(&self) -> bool {
    self.error.is_none()
  }

  /// What the model sees for this call.
  pub fn payload(&self) -> Value {
    match (&self.error, &self.output) {
      (Some(error), _) => error.to_payload(),
      (None, Some(output)) => output.clone(),
      (None, None) => Value::Null,
    }
  }
}

pub struct Session {
  id: String,
  history: Vec<Message>,
  model: Arc<dyn ModelClient>,
  tools: Arc<ToolRegistry>,
  config: SessionConfig,
  phase: SessionPhase,
}

impl Session {
  /// Create a session whose history holds exactly the system prompt.
  pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, config: SessionConfig) -> Self {
    let id = uuid::Uuid::new_v4().to_string();
    info!(
      session_id = %id,
      model = model.name(),
      provider = model.provider(),
      tools = tools.len(),
      project = %config.project_path.display(),
      "session created"
    );
    Self {
      id,
      history: vec![Message::system(config.system_prompt.clone())],
      model,
      tools,
      config,
      phase: SessionPhase::AwaitingUserInput,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn history(&self) -> &[Message] {
    &self.history
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn tools(&self) -> &ToolRegistry {
    &self.tools
  }

  pub fn phase(&self) -> SessionPhase {
    self.phase
  }

  pub fn add_user_message(&mut self, content: impl Into<String>) {
    self.push(Message::user(content));
  }

  pub fn add_assistant_message(&mut self, content: impl Into<MessageContent>) {
    self.push(Message::assistant(content));
    self.transition(SessionPhase::AwaitingUserInput);
  }

  /// Record a model response, including the tool calls it requested.
  pub fn add_assistant_response(&mut self, response: &Response) {
    self.push(Message::assistant_with_tool_calls(
      response.content.clone(),
      response.tool_calls.clone(),
    ));
    self.transition(if response.has_tool_calls() {
      SessionPhase::ToolExecuting
    } else {
      SessionPhase::AwaitingUserInput
    });
  }

  pub fn add_tool_result(&mut self, result: &ToolUseResult) {
    self.push(Message::tool(
      result.call_id.clone(),
      result.tool_name.clone(),
      result.payload(),
    ));
  }

  fn push(&mut self, message: Message) {
    debug!(session_id = %self.id, role = ?message.role, len = self.history.len() + 1, "history append");
    self.history.push(message);
  }

  fn request(&self) -> ModelRequest {
    ModelRequest {
      messages: self.history.clone(),
      tools: self.tools.declarations(),
      max_tokens: self.config.max_tokens,
      temperature: self.config.temperature,
    }
  }

  fn transition(&mut self, next: SessionPhase) {
    if !self.phase.can_transition_to(next) {
      debug!(session_id = %self.id, from = ?self.phase, to = ?next, "out-of-cycle phase change");
    }
    self.phase = next;
  }

  /// Send history and tool declarations to the model and return its
  /// response as-is. History is not modified; record the response with
  /// [`add_assistant_response`](Self::add_assistant_response).
  pub async fn query(&mut self, cancel: &CancellationToken) -> Result<Response, SessionError> {
    self.transition(SessionPhase::ModelQuerying);
    let request = self.request();
    debug!(session_id = %self.id, messages = request.messages.len(), "querying model");

    let result = tokio::select! {
      _ = cancel.cancelled() => Err(SessionError::Cancelled),
      response = self.model.query(request) => response.map_err(SessionError::from),
    };
    let response = match result {
      Ok(response) if response.content.is_empty() && !response.has_tool_calls() => {
        Err(SessionError::Model(ModelError::EmptyResponse))
      }
      other => other,
    };

    match &response {
      Ok(response) => {
        info!(
          session_id = %self.id,
          tool_calls = response.tool_calls.len(),
          prompt_tokens = response.usage.prompt_tokens,
          completion_tokens = response.usage.completion_tokens,
          finish_reason = response.finish_reason.as_deref().unwrap_or(""),
          "model responded"
        );
        self.transition(if response.has_tool_calls() {
          SessionPhase::ToolExecuting
        } else {
          SessionPhase::AwaitingUserInput
        });
      }
      Err(err) => {
        warn!(session_id = %self.id, error = %err, "model query failed");
        self.transition(SessionPhase::AwaitingUserInput);
      }
    }
    response
  }

  /// Streaming variant of [`query`](Self::query). Dropping the returned
  /// stream, or cancelling `cancel`, abandons the request.
  pub async fn stream_query(
    &mut self,
    cancel: &CancellationToken,
  ) -> Result<ResponseStream, SessionError> {
    self.transition(SessionPhase::ModelQuerying);
    let request = self.request();
    debug!(session_id = %self.id, messages = request.messages.len(), "streaming model query");

    let result = tokio::select! {
      _ = cancel.cancelled() => Err(SessionError::Cancelled),
      stream = self.model.stream_query(request, cancel.child_token()) => stream.map_err(SessionError::from),
    };
    if let Err(err) = &result {
      warn!(session_id = %self.id, error = %err, "streaming query failed");
      self.transition(SessionPhase::AwaitingUserInput);
    }
    result
  }

  /// Advisory permission check for hosts that gate tool use.
  pub fn needs_approval(&self, call: &ToolCall) -> bool {
    self
      .tools
      .get_tool(&call.tool_name)
      .is_some_and(|tool| tool.requires_permission(&call.input))
      && !self.config.is_approved(&call.tool_name)
  }

  /// Look up, validate and run one tool call, then append its result to
  /// history whether it succeeded or not.
  ///
  /// An unknown tool name is an error and leaves history untouched.
  pub async fn execute_tool(
    &mut self,
    call: &ToolCall,
    cancel: &CancellationToken,
  ) -> Result<ToolUseResult, SessionError> {
    let Some(tool) = self.tools.get_tool(&call.tool_name) else {
      warn!(session_id = %self.id, tool = %call.tool_name, "model requested unknown tool");
      return Err(SessionError::ToolNotFound(call.tool_name.clone()));
    };
    self.transition(SessionPhase::ToolExecuting);

    if tool.requires_permission(&call.input) {
      // Gating is the host's job; see `needs_approval`.
      debug!(
        tool = %call.tool_name,
        approved = self.config.is_approved(&call.tool_name),
        "tool requires permission"
      );
    }

    let result = match tool.validate_input(&call.input) {
      Err(err) => {
        info!(tool = %call.tool_name, error = %err, "tool input rejected");
        ToolUseResult::failed(call, err)
      }
      Ok(()) => {
        let ctx = ToolContext::new(self.config.project_path.clone(), cancel.child_token());
        debug!(tool = %call.tool_name, call_id = %call.id, "executing tool");
        match tool.execute(&ctx, &call.input).await {
          Ok(output) => ToolUseResult::succeeded(call, output),
          Err(err) => {
            info!(tool = %call.tool_name, error = %err, "tool execution failed");
            ToolUseResult::failed(call, err)
          }
        }
      }
    };

    self.add_tool_result(&result);
    Ok(result)
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("id", &self.id)
      .field("model", &self.model.name())
      .field("history_len", &self.history.len())
      .field("phase", &self.phase)
      .finish()
  }
}
