// Configuration Loader
// Layered configuration loading system

use std::path::{Path, PathBuf};

use toml::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::layered::{ConfigLayerSource, LayeredConfig, table_from_dotted_key};
use crate::types::Config;

pub const CONFIG_DIR_NAME: &str = ".kode";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration loader with layered support
pub struct ConfigLoader {
  /// Global config directory
  global_dir: PathBuf,
  /// Project root; its `.kode/config.toml` is the project layer
  project_dir: Option<PathBuf>,
}

impl ConfigLoader {
  pub fn new() -> Self {
    let global_dir = dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(CONFIG_DIR_NAME);

    Self {
      global_dir,
      project_dir: None,
    }
  }

  pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
    self.global_dir = dir;
    self
  }

  pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
    self.project_dir = Some(dir);
    self
  }

  pub fn load(&self) -> Result<Config, ConfigError> {
    self.load_with_cli_overrides(&[])
  }

  /// Load configuration with CLI overrides
  pub fn load_with_cli_overrides(
    &self,
    cli_overrides: &[(String, String)],
  ) -> Result<Config, ConfigError> {
    // Layers, lowest precedence first:
    // 1. Built-in defaults
    // 2. Global config (~/.kode/config.toml)
    // 3. Project config (<project>/.kode/config.toml)
    // 4. CLI overrides
    let mut layered = LayeredConfig::new();
    layered.add_layer(ConfigLayerSource::Default, Value::try_from(Config::default())?);

    let global_path = self.global_dir.join(CONFIG_FILE_NAME);
    if let Some(values) = read_layer(&global_path)? {
      debug!(path = %global_path.display(), "loaded global config");
      layered.add_layer(ConfigLayerSource::GlobalConfig, values);
    }

    if let Some(project_dir) = &self.project_dir {
      let project_path = project_config_path(project_dir);
      if let Some(values) = read_layer(&project_path)? {
        debug!(path = %project_path.display(), "loaded project config");
        layered.add_layer(ConfigLayerSource::ProjectConfig, values);
      }
    }

    for (key, value) in cli_overrides {
      debug!(%key, "applying cli override");
      layered.add_layer(
        ConfigLayerSource::CliOverride,
        table_from_dotted_key(key, parse_override_value(value)),
      );
    }

    let config: Config = layered.merge().try_into().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
  }
}

impl Default for ConfigLoader {
  fn default() -> Self {
    Self::new()
  }
}

pub fn project_config_path(project_dir: &Path) -> PathBuf {
  project_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Missing files are skipped; unreadable or malformed ones are errors.
fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(err) => return Err(ConfigError::io(path, err)),
  };
  let table: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source: Box::new(source),
  })?;
  Ok(Some(Value::Table(table)))
}

/// Split a `key=value` override.
pub fn parse_override(raw: &str) -> Result<(String, String), ConfigError> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(ConfigError::InvalidOverride(raw.to_string()));
  }
  Ok((key.to_string(), value.trim().to_string()))
}

/// Values parse as TOML scalars/arrays; anything else is taken as a bare string.
fn parse_override_value(raw: &str) -> Value {
  toml::from_str::<toml::Table>(&format!("value = {raw}"))
    .ok()
    .and_then(|mut table| table.remove("value"))
    .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn override_values_parse_as_toml_scalars() {
    assert_eq!(parse_override_value("42"), Value::Integer(42));
    assert_eq!(parse_override_value("true"), Value::Boolean(true));
    assert_eq!(parse_override_value("gpt-4o"), Value::String("gpt-4o".into()));
    assert_eq!(parse_override_value("\"quoted\""), Value::String("quoted".into()));
  }

  #[test]
  fn parse_override_requires_equals() {
    assert!(matches!(
      parse_override("models.model"),
      Err(ConfigError::InvalidOverride(_))
    ));
    let (key, value) = parse_override("models.model = x").expect("override");
    assert_eq!(key, "models.model");
    assert_eq!(value, "x");
  }
}
