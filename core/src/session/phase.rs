// Session Phase
// Where a session is in the query/tool cycle

use serde::{Deserialize, Serialize};

/// Session loop phase.
///
/// Nominal cycle: `AwaitingUserInput → ModelQuerying → (ToolExecuting →
/// ModelQuerying)* → AwaitingUserInput`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
  #[default]
  AwaitingUserInput,
  ModelQuerying,
  ToolExecuting,
}

impl SessionPhase {
  /// Whether `next` follows `self` in the nominal cycle. Staying put is allowed.
  pub fn can_transition_to(self, next: SessionPhase) -> bool {
    use SessionPhase::*;

    self == next
      || matches!(
        (self, next),
        (AwaitingUserInput, ModelQuerying)
          | (ModelQuerying, ToolExecuting)
          | (ModelQuerying, AwaitingUserInput)
          | (ToolExecuting, ModelQuerying)
      )
  }
}
