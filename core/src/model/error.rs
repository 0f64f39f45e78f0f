//! Model layer error types

use thiserror::Error;

/// Failures talking to the model backend. Cloneable so a stream can carry
/// one inside its terminal chunk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
  /// Network or API failure; not retried here
  #[error("transport error: {0}")]
  Transport(String),

  /// Malformed response from the backend
  #[error("protocol error: {0}")]
  Protocol(String),

  /// Response carried neither content nor tool calls
  #[error("model returned an empty response")]
  EmptyResponse,

  /// Stream closed before its terminal chunk
  #[error("response stream closed before completion")]
  StreamClosed,

  #[error("model request cancelled")]
  Cancelled,
}

pub type Result<T> = std::result::Result<T, ModelError>;
