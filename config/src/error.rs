use std::path::PathBuf;

/// Errors raised while loading, merging or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to access {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("failed to edit {path}: {source}")]
  Edit {
    path: PathBuf,
    #[source]
    source: Box<toml_edit::TomlError>,
  },

  #[error("merged configuration is malformed: {0}")]
  Merge(#[from] Box<toml::de::Error>),

  #[error("failed to serialize configuration: {0}")]
  Serialize(#[from] toml::ser::Error),

  #[error("invalid override `{0}`: expected key=value")]
  InvalidOverride(String),

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

impl ConfigError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
