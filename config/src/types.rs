// Configuration Types
// All configuration type definitions

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Model selection and credentials lookup
  pub models: ModelsConfig,
  /// Session defaults
  pub session: SessionSettings,
  /// Tool approvals and limits
  pub tools: ToolsConfig,
}

impl Config {
  /// Check value ranges that serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.models.model.trim().is_empty() {
      return Err(ConfigError::Invalid("models.model must not be empty".to_string()));
    }
    if !(0.0..=2.0).contains(&self.session.temperature) {
      return Err(ConfigError::Invalid(format!(
        "session.temperature must be within 0.0..=2.0, got {}",
        self.session.temperature
      )));
    }
    if self.session.max_tokens == 0 {
      return Err(ConfigError::Invalid(
        "session.max_tokens must be greater than zero".to_string(),
      ));
    }
    if self.session.max_turn_steps == 0 {
      return Err(ConfigError::Invalid(
        "session.max_turn_steps must be greater than zero".to_string(),
      ));
    }
    if !(self.tools.bash_timeout_secs > 0.0 && self.tools.bash_timeout_secs <= MAX_BASH_TIMEOUT_SECS)
    {
      return Err(ConfigError::Invalid(format!(
        "tools.bash_timeout_secs must be within (0, {MAX_BASH_TIMEOUT_SECS}], got {}",
        self.tools.bash_timeout_secs
      )));
    }
    Ok(())
  }

  /// Whether the project has pre-approved `tool`.
  pub fn is_tool_approved(&self, tool: &str) -> bool {
    self.tools.approved.iter().any(|name| name == tool)
  }
}

// ============================================================================
// MODELS
// ============================================================================

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
  /// Provider identifier (e.g. "openai")
  pub provider: String,
  /// Model identifier
  pub model: String,
  /// Optional endpoint override
  #[serde(skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,
  /// Environment variable holding the API credential
  pub api_key_env: String,
}

impl Default for ModelsConfig {
  fn default() -> Self {
    Self {
      provider: "openai".to_string(),
      model: "gpt-4o-mini".to_string(),
      base_url: None,
      api_key_env: "OPENAI_API_KEY".to_string(),
    }
  }
}

impl ModelsConfig {
  /// Resolve the API credential from the environment. Credentials are never
  /// read from or written to config files.
  pub fn api_key(&self) -> Option<String> {
    std::env::var(&self.api_key_env)
      .ok()
      .filter(|key| !key.trim().is_empty())
  }
}

// ============================================================================
// SESSION
// ============================================================================

pub const DEFAULT_SYSTEM_PROMPT: &str =
  "You are a helpful AI assistant that can use tools to help with coding tasks.";

/// Defaults applied when a session is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  pub system_prompt: String,
  pub max_tokens: u32,
  pub temperature: f32,
  /// Upper bound on model round-trips in one user turn
  pub max_turn_steps: usize,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self {
      system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
      max_tokens: 4096,
      temperature: 0.7,
      max_turn_steps: 8,
    }
  }
}

// ============================================================================
// TOOLS
// ============================================================================

pub const MAX_BASH_TIMEOUT_SECS: f64 = 300.0;

/// Tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
  /// Tools the project owner approved ahead of time
  pub approved: Vec<String>,
  /// Default timeout for shell commands, in seconds
  pub bash_timeout_secs: f64,
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self {
      approved: Vec::new(),
      bash_timeout_secs: 30.0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.session.max_tokens, 4096);
    assert_eq!(config.session.system_prompt, DEFAULT_SYSTEM_PROMPT);
  }

  #[test]
  fn rejects_out_of_range_temperature() {
    let mut config = Config::default();
    config.session.temperature = 3.5;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
  }

  #[test]
  fn rejects_zero_timeout() {
    let mut config = Config::default();
    config.tools.bash_timeout_secs = 0.0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let config: Config = toml::from_str("[session]\nmax_tokens = 128\n").expect("parse");
    assert_eq!(config.session.max_tokens, 128);
    assert_eq!(config.session.temperature, 0.7);
    assert_eq!(config.models.provider, "openai");
  }
}
