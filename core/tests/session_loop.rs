//! End-to-end tests for the session loop against a scripted model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kode_core::model::{
  self, ModelClient, ModelError, ModelRequest, Response, Role, ToolCall, ToolInput, Usage,
};
use kode_core::{
  Session, SessionConfig, SessionError, SessionPhase, StopReason, ToolApproval, ToolRegistry,
  TurnConfig, TurnEvent, TurnExecutor,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Replays canned responses in order and records every request it sees.
#[derive(Default)]
struct ScriptedModelClient {
  responses: Mutex<VecDeque<model::Result<Response>>>,
  requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModelClient {
  fn new(responses: Vec<model::Result<Response>>) -> Arc<Self> {
    Arc::new(Self {
      responses: Mutex::new(responses.into()),
      requests: Mutex::new(Vec::new()),
    })
  }

  fn requests(&self) -> Vec<ModelRequest> {
    self.requests.lock().expect("requests lock").clone()
  }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
  fn name(&self) -> &str {
    "scripted"
  }

  fn provider(&self) -> &str {
    "test"
  }

  async fn query(&self, request: ModelRequest) -> model::Result<Response> {
    self.requests.lock().expect("requests lock").push(request);
    self
      .responses
      .lock()
      .expect("responses lock")
      .pop_front()
      .unwrap_or(Err(ModelError::Transport("script exhausted".to_string())))
  }
}

/// Never answers.
struct StalledModelClient;

#[async_trait]
impl ModelClient for StalledModelClient {
  fn name(&self) -> &str {
    "stalled"
  }

  fn provider(&self) -> &str {
    "test"
  }

  async fn query(&self, _request: ModelRequest) -> model::Result<Response> {
    std::future::pending().await
  }
}

fn input(value: Value) -> ToolInput {
  match value {
    Value::Object(map) => map,
    _ => ToolInput::new(),
  }
}

fn call(id: &str, tool: &str, args: Value) -> ToolCall {
  ToolCall::new(id, tool, input(args))
}

fn text(content: &str) -> model::Result<Response> {
  Ok(Response {
    content: content.to_string(),
    usage: Usage {
      prompt_tokens: 10,
      completion_tokens: 5,
      total_tokens: 15,
      cost: 0.0,
    },
    finish_reason: Some("stop".to_string()),
    ..Response::default()
  })
}

fn tools(calls: Vec<ToolCall>) -> model::Result<Response> {
  Ok(Response {
    tool_calls: calls,
    usage: Usage {
      prompt_tokens: 20,
      completion_tokens: 3,
      total_tokens: 23,
      cost: 0.0,
    },
    finish_reason: Some("tool_calls".to_string()),
    ..Response::default()
  })
}

fn session_in(dir: &std::path::Path, model: Arc<dyn ModelClient>) -> Session {
  Session::new(
    model,
    Arc::new(ToolRegistry::with_default_tools()),
    SessionConfig::new(dir),
  )
}

fn system_messages(session: &Session) -> usize {
  session
    .history()
    .iter()
    .filter(|message| message.role == Role::System)
    .count()
}

#[tokio::test]
async fn history_keeps_a_single_leading_system_message() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut session = session_in(dir.path(), ScriptedModelClient::new(Vec::new()));
  assert_eq!(session.history().len(), 1);
  assert_eq!(session.history()[0].role, Role::System);

  for i in 0..5 {
    session.add_user_message(format!("question {i}"));
    session.add_assistant_message(format!("answer {i}"));
  }
  let cancel = CancellationToken::new();
  session
    .execute_tool(&call("c1", "think", json!({ "prompt": "hmm" })), &cancel)
    .await
    .expect("think");

  assert_eq!(system_messages(&session), 1);
  assert_eq!(session.history()[0].role, Role::System);
  assert_eq!(session.history().len(), 12);
}

#[tokio::test]
async fn unknown_tool_is_an_error_and_leaves_history_alone() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut session = session_in(dir.path(), ScriptedModelClient::new(Vec::new()));
  session.add_user_message("hi");
  let before = session.history().to_vec();

  let err = session
    .execute_tool(&call("c1", "teleport", json!({})), &CancellationToken::new())
    .await
    .expect_err("unknown tool");
  assert!(matches!(err, SessionError::ToolNotFound(name) if name == "teleport"));
  assert_eq!(session.history(), before.as_slice());
}

#[tokio::test]
async fn validation_failure_is_recorded_as_tool_result() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut session = session_in(dir.path(), ScriptedModelClient::new(Vec::new()));

  let result = session
    .execute_tool(
      &call("c1", "read_file", json!({ "file_path": "" })),
      &CancellationToken::new(),
    )
    .await
    .expect("recorded");
  assert!(!result.is_success());
  assert!(result.error.as_ref().is_some_and(|err| err.is_validation()));

  let last = session.history().last().expect("tool message");
  assert_eq!(last.role, Role::Tool);
  assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
  assert_eq!(last.name.as_deref(), Some("read_file"));
  assert!(result.payload()["error"].is_string());
}

#[tokio::test]
async fn write_then_append_then_read_through_the_session() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut session = session_in(dir.path(), ScriptedModelClient::new(Vec::new()));
  let cancel = CancellationToken::new();

  let write = session
    .execute_tool(
      &call(
        "w",
        "write_file",
        json!({ "file_path": "notes.txt", "content": "alpha", "trailing_newline": false }),
      ),
      &cancel,
    )
    .await
    .expect("write");
  assert!(write.is_success());

  let append = session
    .execute_tool(
      &call(
        "a",
        "write_file",
        json!({
          "file_path": "notes.txt",
          "content": "\nbeta",
          "append": true,
          "leading_newline": false
        }),
      ),
      &cancel,
    )
    .await
    .expect("append");
  assert!(append.is_success());

  let read = session
    .execute_tool(&call("r", "read_file", json!({ "file_path": "notes.txt" })), &cancel)
    .await
    .expect("read");
  assert_eq!(read.payload()["content"], "alpha\nbeta");
  assert_eq!(
    std::fs::read_to_string(dir.path().join("notes.txt")).expect("on disk"),
    "alpha\nbeta"
  );
}

#[tokio::test]
async fn turn_runs_tools_until_the_model_answers() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![
    tools(vec![call("c1", "think", json!({ "prompt": "write a file first" }))]),
    tools(vec![
      call(
        "c2",
        "write_file",
        json!({ "file_path": "out/hello.txt", "content": "hello" }),
      ),
      call("c3", "read_file", json!({ "file_path": "out/hello.txt" })),
    ]),
    text("done"),
  ]);
  let mut session = session_in(dir.path(), model.clone());
  let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
  let executor = TurnExecutor::new(TurnConfig::default()).with_events(events_tx);

  let result = executor
    .run_turn(&mut session, "make hello.txt", &CancellationToken::new())
    .await
    .expect("turn");

  assert_eq!(result.final_message, "done");
  assert_eq!(result.steps, 3);
  assert_eq!(result.stop_reason, StopReason::NoToolCalls);
  assert_eq!(result.usage.total_tokens, 23 + 23 + 15);
  assert_eq!(session.phase(), SessionPhase::AwaitingUserInput);
  assert_eq!(
    std::fs::read_to_string(dir.path().join("out/hello.txt")).expect("written"),
    "hello\n"
  );

  let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
  assert_eq!(
    roles,
    vec![
      Role::System,
      Role::User,
      Role::Assistant,
      Role::Tool,
      Role::Assistant,
      Role::Tool,
      Role::Tool,
      Role::Assistant,
    ]
  );
  let read_result = &session.history()[6];
  assert_eq!(read_result.tool_call_id.as_deref(), Some("c3"));
  assert_eq!(
    read_result.content,
    model::MessageContent::Structured(json!({ "type": "text", "content": "hello\n" }))
  );

  // Each query sees everything recorded before it.
  let requests = model.requests();
  assert_eq!(requests.len(), 3);
  assert_eq!(requests[0].messages.len(), 2);
  assert_eq!(requests[1].messages.len(), 4);
  assert_eq!(requests[2].messages.len(), 7);

  let mut events = Vec::new();
  while let Ok(event) = events_rx.try_recv() {
    events.push(event);
  }
  assert_eq!(events.len(), 3 + 3 * 2);
  assert_eq!(
    events[1],
    TurnEvent::ToolStarted {
      call_id: "c1".to_string(),
      tool_name: "think".to_string(),
    }
  );
}

#[tokio::test]
async fn turn_stops_at_the_step_limit() {
  let dir = tempfile::tempdir().expect("tempdir");
  let think = || tools(vec![call("c", "think", json!({ "prompt": "again" }))]);
  let model = ScriptedModelClient::new(vec![think(), think(), think()]);
  let mut session = session_in(dir.path(), model.clone());

  let result = TurnExecutor::new(TurnConfig { max_steps: 2 })
    .run_turn(&mut session, "loop", &CancellationToken::new())
    .await
    .expect("turn");

  assert_eq!(result.stop_reason, StopReason::MaxSteps);
  assert_eq!(result.steps, 2);
  assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn denied_calls_are_recorded_without_running() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![
    tools(vec![call(
      "c1",
      "write_file",
      json!({ "file_path": "blocked.txt", "content": "x" }),
    )]),
    text("ok, skipped"),
  ]);
  let mut session = session_in(dir.path(), model);

  let result = TurnExecutor::default()
    .with_approval(|call| ToolApproval::Deny {
      reason: format!("{} is not allowed", call.tool_name),
    })
    .run_turn(&mut session, "write it", &CancellationToken::new())
    .await
    .expect("turn");

  assert_eq!(result.final_message, "ok, skipped");
  assert!(!dir.path().join("blocked.txt").exists());
  let denial = &session.history()[3];
  assert_eq!(denial.role, Role::Tool);
  assert_eq!(
    denial.content,
    model::MessageContent::Structured(json!({
      "error": "permission denied: write_file is not allowed"
    }))
  );
}

#[tokio::test]
async fn approval_hook_is_skipped_for_tools_without_permission() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![
    tools(vec![call("c1", "think", json!({ "prompt": "plan" }))]),
    text("planned"),
  ]);
  let mut session = session_in(dir.path(), model);

  TurnExecutor::default()
    .with_approval(|_| ToolApproval::Deny {
      reason: "nothing runs".to_string(),
    })
    .run_turn(&mut session, "think", &CancellationToken::new())
    .await
    .expect("turn");

  assert_eq!(
    session.history()[3].content,
    model::MessageContent::Structured(json!({ "reasoning": "plan" }))
  );
}

#[tokio::test]
async fn empty_response_is_an_error() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![Ok(Response::default())]);
  let mut session = session_in(dir.path(), model);
  session.add_user_message("hello?");

  let err = session
    .query(&CancellationToken::new())
    .await
    .expect_err("empty");
  assert!(matches!(err, SessionError::Model(ModelError::EmptyResponse)));
  assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn model_errors_pass_through_unchanged() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![Err(ModelError::Transport("503".to_string()))]);
  let mut session = session_in(dir.path(), model);

  let err = session
    .query(&CancellationToken::new())
    .await
    .expect_err("transport");
  assert!(matches!(err, SessionError::Model(ModelError::Transport(msg)) if msg == "503"));
  assert_eq!(session.phase(), SessionPhase::AwaitingUserInput);
}

#[tokio::test]
async fn query_sends_declarations_and_settings() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![text("hi")]);
  let mut session = Session::new(
    model.clone(),
    Arc::new(ToolRegistry::with_default_tools().read_only()),
    SessionConfig::new(dir.path()).with_system_prompt("be brief"),
  );
  session.add_user_message("hello");
  session
    .query(&CancellationToken::new())
    .await
    .expect("query");

  let requests = model.requests();
  let request = &requests[0];
  let mut names: Vec<&str> = request.tools.iter().map(|d| d.name.as_str()).collect();
  names.sort_unstable();
  assert_eq!(names, vec!["glob", "grep", "list_dir", "read_file", "think"]);
  assert_eq!(request.messages[0].text(), Some("be brief"));
  assert_eq!(request.max_tokens, 4096);
}

#[tokio::test]
async fn streamed_query_collects_into_a_response() {
  let dir = tempfile::tempdir().expect("tempdir");
  let model = ScriptedModelClient::new(vec![Ok(Response {
    content: "streamed".to_string(),
    tool_calls: vec![call("c1", "think", json!({ "prompt": "p" }))],
    ..Response::default()
  })]);
  let mut session = session_in(dir.path(), model);

  let stream = session
    .stream_query(&CancellationToken::new())
    .await
    .expect("stream");
  let response = stream.into_response().await.expect("collect");
  assert_eq!(response.content, "streamed");
  assert_eq!(response.tool_calls.len(), 1);

  session.add_assistant_response(&response);
  assert_eq!(session.phase(), SessionPhase::ToolExecuting);
}

#[tokio::test]
async fn cancelled_query_returns_promptly() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut session = session_in(dir.path(), Arc::new(StalledModelClient));
  session.add_user_message("wait");
  let cancel = CancellationToken::new();

  let canceller = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    canceller.cancel();
  });

  let err = tokio::time::timeout(std::time::Duration::from_secs(5), session.query(&cancel))
    .await
    .expect("query should observe cancellation")
    .expect_err("cancelled");
  assert!(matches!(err, SessionError::Cancelled));
  assert_eq!(session.history().len(), 2);
}
