use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::exec::{self, ExecRequest};
use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TIMEOUT_SECS: f64 = 300.0;

/// Substrings that reject a command outright. A coarse guard against
/// well-known destructive invocations; trivially bypassed, so not a sandbox.
pub const DENIED_COMMAND_PATTERNS: &[&str] = &[
  "rm -rf /",
  "rm -rf /*",
  "rm -rf ~",
  ":(){ :|:& };:",
  ":(){:|:&};:",
  "> /dev/sda",
  "dd if=/dev/random of=/dev/sda",
  "dd if=/dev/zero of=/dev/sda",
  "mkfs",
  "mv /* /dev/null",
  "| bash",
  "| sh -",
];

pub struct BashTool {
  default_timeout: Duration,
}

impl BashTool {
  pub fn new(default_timeout: Duration) -> Self {
    Self { default_timeout }
  }
}

impl Default for BashTool {
  fn default() -> Self {
    Self::new(DEFAULT_TIMEOUT)
  }
}

#[derive(Debug, Deserialize)]
struct BashArgs {
  command: String,
  /// Seconds; fractions allowed
  #[serde(default)]
  timeout: Option<f64>,
}

impl ToolArgs for BashArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("command", &self.command)?;
    if let Some(timeout) = self.timeout
      && !(timeout.is_finite() && timeout > 0.0 && timeout <= MAX_TIMEOUT_SECS)
    {
      return Err(ToolError::Validation(format!(
        "timeout must be greater than 0 and at most {MAX_TIMEOUT_SECS} seconds"
      )));
    }
    if let Some(pattern) = denied_pattern(&self.command) {
      return Err(ToolError::Validation(format!(
        "command contains potentially dangerous operations: {pattern}"
      )));
    }
    Ok(())
  }
}

pub fn denied_pattern(command: &str) -> Option<&'static str> {
  DENIED_COMMAND_PATTERNS
    .iter()
    .copied()
    .find(|pattern| command.contains(pattern))
}

#[async_trait]
impl Tool for BashTool {
  fn name(&self) -> &'static str {
    "bash"
  }

  fn description(&self) -> &'static str {
    "Run a shell command in the project directory and return its stdout, stderr and exit code. \
     Commands that exceed the timeout are killed and reported as interrupted."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("command", JsonSchema::string("The shell command to execute")),
        (
          "timeout",
          JsonSchema::number("Timeout in seconds (default 30, max 300)"),
        ),
      ],
      &["command"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<BashArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: BashArgs = decode(self.name(), input)?;
    let timeout = args
      .timeout
      .map(Duration::from_secs_f64)
      .unwrap_or(self.default_timeout);

    let request = ExecRequest {
      command: args.command,
      cwd: ctx.cwd.clone(),
      timeout,
    };
    let output = exec::run(&request, &ctx.cancel).await?;
    serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
  }

  fn is_read_only(&self) -> bool {
    false
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn input(value: Value) -> ToolInput {
    match value {
      Value::Object(map) => map,
      _ => ToolInput::new(),
    }
  }

  #[test]
  fn rejects_every_denied_pattern_regardless_of_context() {
    let tool = BashTool::default();
    for pattern in DENIED_COMMAND_PATTERNS {
      for command in [
        pattern.to_string(),
        format!("echo hi && {pattern}"),
        format!("true; {pattern} # trailing"),
      ] {
        let result = tool.validate_input(&input(json!({ "command": command })));
        assert!(
          matches!(&result, Err(ToolError::Validation(msg)) if msg.contains("dangerous")),
          "{command:?} was not rejected: {result:?}"
        );
      }
    }
  }

  #[test]
  fn accepts_ordinary_commands() {
    let tool = BashTool::default();
    for command in ["ls -la", "cargo --version", "rm -rf ./target", "echo $HOME"] {
      assert!(
        tool.validate_input(&input(json!({ "command": command }))).is_ok(),
        "{command}"
      );
    }
  }

  #[test]
  fn validates_command_and_timeout() {
    let tool = BashTool::default();
    assert!(tool.validate_input(&input(json!({}))).is_err());
    assert!(tool.validate_input(&input(json!({ "command": "  " }))).is_err());
    assert!(tool.validate_input(&input(json!({ "command": 7 }))).is_err());
    assert!(
      tool
        .validate_input(&input(json!({ "command": "ls", "timeout": 0 })))
        .is_err()
    );
    assert!(
      tool
        .validate_input(&input(json!({ "command": "ls", "timeout": 301 })))
        .is_err()
    );
    assert!(
      tool
        .validate_input(&input(json!({ "command": "ls", "timeout": 0.5 })))
        .is_ok()
    );
    assert!(
      tool
        .validate_input(&input(json!({ "command": "ls", "timeout": 300 })))
        .is_ok()
    );
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn execute_returns_structured_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("hello.txt"), "hi").expect("fixture");
    let ctx = ToolContext::new(dir.path(), Default::default());

    let output = BashTool::default()
      .execute(&ctx, &input(json!({ "command": "cat hello.txt; exit 2" })))
      .await
      .expect("execute");

    assert_eq!(
      output,
      json!({ "stdout": "hi", "stderr": "", "exit_code": 2, "interrupted": false })
    );
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn execute_reports_timeout_as_interrupted() {
    let ctx = ToolContext::default();
    let output = BashTool::default()
      .execute(&ctx, &input(json!({ "command": "sleep 20", "timeout": 0.2 })))
      .await
      .expect("execute");

    assert_eq!(output["interrupted"], true);
    assert_eq!(output["exit_code"], 0);
    assert!(
      output["stderr"]
        .as_str()
        .is_some_and(|stderr| stderr.ends_with("Command execution timed out"))
    );
  }

  #[tokio::test]
  async fn execute_without_validation_fails_gracefully() {
    let ctx = ToolContext::default();
    let result = BashTool::default()
      .execute(&ctx, &input(json!({ "command": "rm -rf /" })))
      .await;
    assert!(matches!(result, Err(ToolError::Validation(_))));
  }
}
