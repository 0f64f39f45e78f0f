//! Streaming responses
//!
//! A single-producer/single-consumer channel holding at most one pending
//! chunk, so an idle consumer applies backpressure to the producer. The
//! producer side is consumed by [`ChunkSender::finish`] or
//! [`ChunkSender::fail`], which makes the terminal chunk unique. Dropping the
//! [`ResponseStream`] cancels the producer.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use super::error::{ModelError, Result};
use super::types::{Response, ResponseChunk, ToolCall, Usage};

const CHANNEL_CAPACITY: usize = 1;

/// Create a connected producer/consumer pair bound to `cancel`.
pub fn channel(cancel: CancellationToken) -> (ChunkSender, ResponseStream) {
  let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
  let sender = ChunkSender {
    tx,
    cancel: cancel.clone(),
  };
  let stream = ResponseStream {
    rx,
    _guard: cancel.clone().drop_guard(),
    cancel,
  };
  (sender, stream)
}

/// Stream an already complete response: its content, its tool calls, then
/// the terminal chunk.
pub fn replay(response: Response, cancel: CancellationToken) -> ResponseStream {
  let (sender, stream) = channel(cancel);
  tokio::spawn(async move {
    let Response {
      content,
      tool_calls,
      usage,
      finish_reason,
    } = response;
    let result = async {
      if !content.is_empty() {
        sender.send_content(content).await?;
      }
      if !tool_calls.is_empty() {
        sender.send_tool_calls(tool_calls).await?;
      }
      sender.finish(usage, finish_reason).await
    }
    .await;
    if let Err(err) = result {
      debug!(error = %err, "replay stream abandoned");
    }
  });
  stream
}

/// Producer half. Every send fails with [`ModelError::Cancelled`] once the
/// consumer cancels or goes away.
#[derive(Debug)]
pub struct ChunkSender {
  tx: mpsc::Sender<ResponseChunk>,
  cancel: CancellationToken,
}

impl ChunkSender {
  pub async fn send_content(&self, content: impl Into<String>) -> Result<()> {
    self
      .send(ResponseChunk {
        content: content.into(),
        ..ResponseChunk::default()
      })
      .await
  }

  pub async fn send_tool_calls(&self, tool_calls: Vec<ToolCall>) -> Result<()> {
    self
      .send(ResponseChunk {
        tool_calls,
        ..ResponseChunk::default()
      })
      .await
  }

  /// Emit the terminal chunk and close the channel.
  pub async fn finish(self, usage: Usage, finish_reason: Option<String>) -> Result<()> {
    self
      .send(ResponseChunk {
        is_done: true,
        usage: Some(usage),
        finish_reason,
        ..ResponseChunk::default()
      })
      .await
  }

  /// Emit a terminal error chunk and close the channel.
  pub async fn fail(self, error: ModelError) -> Result<()> {
    self
      .send(ResponseChunk {
        is_done: true,
        error: Some(error),
        ..ResponseChunk::default()
      })
      .await
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Resolves when the consumer has cancelled; select on it around network reads.
  pub async fn cancelled(&self) {
    self.cancel.cancelled().await;
  }

  async fn send(&self, chunk: ResponseChunk) -> Result<()> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(ModelError::Cancelled),
      sent = self.tx.send(chunk) => sent.map_err(|_| ModelError::Cancelled),
    }
  }
}

/// Consumer half.
#[derive(Debug)]
pub struct ResponseStream {
  rx: mpsc::Receiver<ResponseChunk>,
  cancel: CancellationToken,
  _guard: DropGuard,
}

impl ResponseStream {
  /// Next chunk in arrival order; `None` once the producer is gone.
  pub async fn recv(&mut self) -> Option<ResponseChunk> {
    self.rx.recv().await
  }

  /// Ask the producer to abandon the underlying request.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Drain the stream into a complete [`Response`].
  pub async fn into_response(mut self) -> Result<Response> {
    let mut response = Response::default();
    while let Some(chunk) = self.rx.recv().await {
      if let Some(err) = chunk.error {
        return Err(err);
      }
      response.content.push_str(&chunk.content);
      response.tool_calls.extend(chunk.tool_calls);
      if chunk.is_done {
        response.usage = chunk.usage.unwrap_or_default();
        response.finish_reason = chunk.finish_reason;
        return Ok(response);
      }
    }
    if self.cancel.is_cancelled() {
      Err(ModelError::Cancelled)
    } else {
      Err(ModelError::StreamClosed)
    }
  }
}

impl Stream for ResponseStream {
  type Item = ResponseChunk;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.get_mut().rx.poll_recv(cx)
  }
}
