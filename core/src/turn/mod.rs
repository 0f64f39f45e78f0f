//! Turn execution
//!
//! Drives one user turn through a [`Session`]: query, record the response,
//! run requested tools in order, and repeat until the model stops asking for
//! tools or the step budget runs out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::{ToolCall, Usage};
use crate::session::{Session, SessionError, ToolUseResult};

pub const DEFAULT_MAX_STEPS: usize = 8;

/// Host decision for a call that needs approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolApproval {
  Approve,
  Deny { reason: String },
}

pub type ApprovalHook = dyn Fn(&ToolCall) -> ToolApproval + Send + Sync;

#[derive(Debug, Clone)]
pub struct TurnConfig {
  /// Maximum model round-trips per turn
  pub max_steps: usize,
}

impl Default for TurnConfig {
  fn default() -> Self {
    Self {
      max_steps: DEFAULT_MAX_STEPS,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  /// The last response requested no tools
  NoToolCalls,
  /// `max_steps` responses all requested tools
  MaxSteps,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
  /// Content of the last model response
  pub final_message: String,
  /// Summed over every query in the turn
  pub usage: Usage,
  pub steps: usize,
  pub stop_reason: StopReason,
}

/// Progress notifications for hosts that render a turn as it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
  ModelResponded {
    step: usize,
    content: String,
    tool_calls: usize,
  },
  ToolStarted {
    call_id: String,
    tool_name: String,
  },
  ToolFinished {
    call_id: String,
    tool_name: String,
    success: bool,
  },
}

#[derive(Default)]
pub struct TurnExecutor {
  config: TurnConfig,
  events: Option<mpsc::UnboundedSender<TurnEvent>>,
  approval: Option<Arc<ApprovalHook>>,
}

impl TurnExecutor {
  pub fn new(config: TurnConfig) -> Self {
    Self {
      config,
      events: None,
      approval: None,
    }
  }

  pub fn with_events(mut self, events: mpsc::UnboundedSender<TurnEvent>) -> Self {
    self.events = Some(events);
    self
  }

  /// Consulted for calls where [`Session::needs_approval`] is true. Without
  /// a hook every call runs.
  pub fn with_approval<F>(mut self, approval: F) -> Self
  where
    F: Fn(&ToolCall) -> ToolApproval + Send + Sync + 'static,
  {
    self.approval = Some(Arc::new(approval));
    self
  }

  fn emit(&self, event: TurnEvent) {
    if let Some(events) = &self.events {
      // A host that stopped listening does not stop the turn.
      let _ = events.send(event);
    }
  }

  pub async fn run_turn(
    &self,
    session: &mut Session,
    user_message: impl Into<String>,
    cancel: &CancellationToken,
  ) -> Result<TurnResult, SessionError> {
    session.add_user_message(user_message);

    let mut usage = Usage::default();
    let mut final_message = String::new();

    for step in 1..=self.config.max_steps.max(1) {
      let response = session.query(cancel).await?;
      usage += response.usage;
      session.add_assistant_response(&response);
      final_message = response.content.clone();
      self.emit(TurnEvent::ModelResponded {
        step,
        content: response.content.clone(),
        tool_calls: response.tool_calls.len(),
      });

      if !response.has_tool_calls() {
        info!(session_id = session.id(), step, "turn complete");
        return Ok(TurnResult {
          final_message,
          usage,
          steps: step,
          stop_reason: StopReason::NoToolCalls,
        });
      }

      for call in &response.tool_calls {
        self.run_tool(session, call, cancel).await?;
        if cancel.is_cancelled() {
          return Err(SessionError::Cancelled);
        }
      }
    }

    info!(session_id = session.id(), max_steps = self.config.max_steps, "turn hit step limit");
    Ok(TurnResult {
      final_message,
      usage,
      steps: self.config.max_steps.max(1),
      stop_reason: StopReason::MaxSteps,
    })
  }

  async fn run_tool(
    &self,
    session: &mut Session,
    call: &ToolCall,
    cancel: &CancellationToken,
  ) -> Result<ToolUseResult, SessionError> {
    self.emit(TurnEvent::ToolStarted {
      call_id: call.id.clone(),
      tool_name: call.tool_name.clone(),
    });

    let decision = match &self.approval {
      Some(approval) if session.needs_approval(call) => approval(call),
      _ => ToolApproval::Approve,
    };
    let result = match decision {
      ToolApproval::Approve => session.execute_tool(call, cancel).await?,
      ToolApproval::Deny { reason } => {
        debug!(tool = %call.tool_name, %reason, "tool call denied by host");
        let result = ToolUseResult::denied(call, reason);
        session.add_tool_result(&result);
        result
      }
    };

    self.emit(TurnEvent::ToolFinished {
      call_id: call.id.clone(),
      tool_name: call.tool_name.clone(),
      success: result.is_success(),
    });
    Ok(result)
  }
}

impl From<&kode_config::Config> for TurnConfig {
  fn from(config: &kode_config::Config) -> Self {
    Self {
      max_steps: config.session.max_turn_steps,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn step_limit_comes_from_session_settings() {
    let mut config = kode_config::Config::default();
    assert_eq!(TurnConfig::from(&config).max_steps, DEFAULT_MAX_STEPS);
    config.session.max_turn_steps = 3;
    assert_eq!(TurnConfig::from(&config).max_steps, 3);
  }
}
