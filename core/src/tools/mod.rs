pub mod context;
pub mod handlers;
pub mod registry;
pub mod spec;

use std::time::Duration;

use kode_config::{Config, MAX_BASH_TIMEOUT_SECS};
use tracing::warn;

pub use context::{ToolArgs, ToolContext, ToolError, decode};
pub use registry::{Tool, ToolFactory, ToolRegistry};
pub use spec::JsonSchema;

/// Build the built-in tool set, honouring configured limits.
///
/// An out-of-range `tools.bash_timeout_secs` falls back to the default
/// shell timeout.
pub fn build_default_tools(config: &Config) -> ToolRegistry {
  let mut registry = ToolRegistry::new();
  handlers::register_builtin_tools_with_timeout(
    &mut registry,
    bash_timeout(config.tools.bash_timeout_secs),
  );
  registry
}

fn bash_timeout(secs: f64) -> Duration {
  match Duration::try_from_secs_f64(secs) {
    Ok(timeout) if secs > 0.0 && secs <= MAX_BASH_TIMEOUT_SECS => timeout,
    _ => {
      warn!(bash_timeout_secs = secs, "invalid shell timeout; using default");
      handlers::bash::DEFAULT_TIMEOUT
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bash_timeout_accepts_configured_value() {
    assert_eq!(bash_timeout(12.5), Duration::from_millis(12_500));
    assert_eq!(bash_timeout(MAX_BASH_TIMEOUT_SECS), Duration::from_secs(300));
  }

  #[test]
  fn unusable_bash_timeout_falls_back_to_default() {
    for secs in [-1.0, 0.0, f64::NAN, f64::INFINITY, 1e30] {
      assert_eq!(bash_timeout(secs), handlers::bash::DEFAULT_TIMEOUT, "{secs}");
    }

    let mut config = Config::default();
    config.tools.bash_timeout_secs = -1.0;
    let registry = build_default_tools(&config);
    assert!(registry.contains("bash"));
  }
}
