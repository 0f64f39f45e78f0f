use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::model::ToolInput;

/// Per-invocation runtime context.
#[derive(Debug, Clone)]
pub struct ToolContext {
  /// Base for relative paths and the shell working directory
  pub cwd: PathBuf,
  /// Fires when the caller abandons the invocation
  pub cancel: CancellationToken,
}

impl ToolContext {
  pub fn new(cwd: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
    Self {
      cwd: cwd.into(),
      cancel,
    }
  }

  pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.cwd.join(path)
    }
  }
}

impl Default for ToolContext {
  fn default() -> Self {
    Self {
      cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
      cancel: CancellationToken::new(),
    }
  }
}

/// Tool invocation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
  /// Malformed or missing input, caught before execution
  #[error("{0}")]
  Validation(String),

  /// The tool ran but could not complete
  #[error("{0}")]
  Execution(String),

  /// Edit target text absent; the file is untouched
  #[error("Old text not found in file: {}", path.display())]
  TextNotFound { path: PathBuf },

  /// The subprocess could not be started
  #[error("failed to start process: {0}")]
  Spawn(String),

  /// The host declined to run the call
  #[error("permission denied: {0}")]
  PermissionDenied(String),

  #[error("tool execution cancelled")]
  Cancelled,
}

impl ToolError {
  pub fn is_validation(&self) -> bool {
    matches!(self, ToolError::Validation(_))
  }

  /// Payload recorded in history when a call fails.
  pub fn to_payload(&self) -> Value {
    serde_json::json!({ "error": self.to_string() })
  }
}

/// Typed arguments decoded from a model-supplied [`ToolInput`].
pub trait ToolArgs: DeserializeOwned {
  /// Semantic checks serde cannot express.
  fn validate(&self) -> Result<(), ToolError> {
    Ok(())
  }
}

/// Project untyped input into `A` and validate it. Every tool goes through
/// here for both `validate_input` and `execute`.
pub fn decode<A: ToolArgs>(tool: &str, input: &ToolInput) -> Result<A, ToolError> {
  let args: A = serde_json::from_value(Value::Object(input.clone()))
    .map_err(|e| ToolError::Validation(format!("invalid arguments for {tool}: {e}")))?;
  args.validate()?;
  Ok(args)
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
  if value.trim().is_empty() {
    return Err(ToolError::Validation(format!("{field} must not be empty")));
  }
  Ok(())
}
