//! Model client
//!
//! The capability a [`Session`](crate::session::Session) depends on. Vendor
//! implementations translate [`ModelRequest`] into their wire format; that
//! translation lives outside this crate.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::Result;
use super::streaming::{self, ResponseStream};
use super::types::{ModelRequest, Response};

/// Model backend trait
///
/// A response may carry zero or more tool calls. Implementations must not
/// retry; errors are surfaced to the session's caller as-is.
#[async_trait]
pub trait ModelClient: Send + Sync {
  /// Model identifier, e.g. "gpt-4o-mini"
  fn name(&self) -> &str;

  /// Provider identifier, e.g. "openai"
  fn provider(&self) -> &str;

  /// Send the full history plus tool declarations and wait for a complete response.
  async fn query(&self, request: ModelRequest) -> Result<Response>;

  /// Stream the response as ordered chunks ending in one terminal chunk.
  ///
  /// Producers should use [`streaming::channel`] and stop when `cancel`
  /// fires. The default replays a non-streaming [`query`](Self::query).
  async fn stream_query(
    &self,
    request: ModelRequest,
    cancel: CancellationToken,
  ) -> Result<ResponseStream> {
    let response = self.query(request).await?;
    Ok(streaming::replay(response, cancel))
  }
}
