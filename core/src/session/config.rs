use std::path::PathBuf;

use kode_config::{Config, DEFAULT_SYSTEM_PROMPT};

/// Values a session is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
  /// Working directory for tools
  pub project_path: PathBuf,
  pub system_prompt: String,
  pub max_tokens: u32,
  pub temperature: f32,
  /// Tools the host treats as pre-approved
  pub approved_tools: Vec<String>,
}

impl SessionConfig {
  pub fn new(project_path: impl Into<PathBuf>) -> Self {
    Self {
      project_path: project_path.into(),
      ..Self::default()
    }
  }

  pub fn from_config(config: &Config, project_path: impl Into<PathBuf>) -> Self {
    Self {
      project_path: project_path.into(),
      system_prompt: config.session.system_prompt.clone(),
      max_tokens: config.session.max_tokens,
      temperature: config.session.temperature,
      approved_tools: config.tools.approved.clone(),
    }
  }

  pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
    self.system_prompt = prompt.into();
    self
  }

  pub fn is_approved(&self, tool: &str) -> bool {
    self.approved_tools.iter().any(|name| name == tool)
  }
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      project_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
      system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
      max_tokens: 4096,
      temperature: 0.7,
      approved_tools: Vec::new(),
    }
  }
}
