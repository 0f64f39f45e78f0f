// Project Configuration
// Per-project tool approvals stored in <project>/.kode/config.toml

use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;
use tracing::info;

use crate::error::ConfigError;
use crate::loader::project_config_path;

/// Handle on a project's config file. Edits go through `toml_edit` so
/// comments and unrelated keys survive.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
  path: PathBuf,
}

impl ProjectConfig {
  pub fn for_project(project_dir: &Path) -> Self {
    Self {
      path: project_config_path(project_dir),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Tools currently approved for this project.
  pub fn approved_tools(&self) -> Result<Vec<String>, ConfigError> {
    let doc = self.read_document()?;
    let approved = doc
      .get("tools")
      .and_then(|tools| tools.get("approved"))
      .and_then(|item| item.as_array())
      .map(|array| {
        array
          .iter()
          .filter_map(|value| value.as_str().map(str::to_string))
          .collect()
      })
      .unwrap_or_default();
    Ok(approved)
  }

  /// Add `tool` to the approved list. Returns false if it was already there.
  pub fn approve_tool(&self, tool: &str) -> Result<bool, ConfigError> {
    let mut doc = self.read_document()?;

    let tools = doc
      .entry("tools")
      .or_insert(toml_edit::table())
      .as_table_mut()
      .ok_or_else(|| ConfigError::Invalid("`tools` must be a table".to_string()))?;
    let approved = tools
      .entry("approved")
      .or_insert(toml_edit::value(toml_edit::Array::new()))
      .as_array_mut()
      .ok_or_else(|| ConfigError::Invalid("`tools.approved` must be an array".to_string()))?;

    if approved.iter().any(|value| value.as_str() == Some(tool)) {
      return Ok(false);
    }
    approved.push(tool);

    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent).map_err(|err| ConfigError::io(parent, err))?;
    }
    std::fs::write(&self.path, doc.to_string()).map_err(|err| ConfigError::io(&self.path, err))?;
    info!(tool, path = %self.path.display(), "approved tool for project");
    Ok(true)
  }

  fn read_document(&self) -> Result<DocumentMut, ConfigError> {
    let content = match std::fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(DocumentMut::new()),
      Err(err) => return Err(ConfigError::io(&self.path, err)),
    };
    content.parse::<DocumentMut>().map_err(|source| ConfigError::Edit {
      path: self.path.clone(),
      source: Box::new(source),
    })
  }
}
