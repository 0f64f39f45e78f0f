//! Model layer
//!
//! - [`ModelClient`]: the backend capability a session drives
//! - [`streaming`]: bounded chunk channel with a single terminal marker
//! - [`types`]: history, tool calls, responses

pub mod client;
pub mod error;
pub mod streaming;
pub mod types;

pub use client::ModelClient;
pub use error::{ModelError, Result};
pub use streaming::{ChunkSender, ResponseStream};
pub use types::*;
