// Kode Core Library
//
// Session loop, model client contract and the built-in tool set.

pub mod exec;
pub mod model;
pub mod session;
pub mod tools;
pub mod turn;

pub use model::{ModelClient, ModelError, Response, ResponseStream};
pub use session::{Session, SessionConfig, SessionError, SessionPhase, ToolUseResult};
pub use tools::{Tool, ToolContext, ToolError, ToolRegistry, build_default_tools};
pub use turn::{StopReason, ToolApproval, TurnConfig, TurnEvent, TurnExecutor, TurnResult};
