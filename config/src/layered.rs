// Layered Configuration
// Support for layered configuration with precedence

use toml::Value;
use toml::map::Map;

/// Ordered stack of configuration layers; later layers win per key.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
  layers: Vec<ConfigLayer>,
}

/// Configuration layer with source tracking
#[derive(Debug, Clone)]
pub struct ConfigLayer {
  pub source: ConfigLayerSource,
  pub values: Value,
}

/// Configuration layer source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
  /// Built-in defaults
  Default,
  /// Global user config
  GlobalConfig,
  /// Project-specific config
  ProjectConfig,
  /// CLI override
  CliOverride,
}

impl LayeredConfig {
  pub fn new() -> Self {
    Self { layers: Vec::new() }
  }

  pub fn add_layer(&mut self, source: ConfigLayerSource, values: Value) {
    self.layers.push(ConfigLayer { source, values });
  }

  pub fn layers(&self) -> &[ConfigLayer] {
    &self.layers
  }

  /// Deep-merge all layers. Tables merge recursively; any other value
  /// replaces what lower layers set for the same key.
  pub fn merge(&self) -> Value {
    let mut merged = Map::new();
    for layer in &self.layers {
      if let Value::Table(table) = &layer.values {
        merge_tables(&mut merged, table);
      }
    }
    Value::Table(merged)
  }
}

fn merge_tables(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
  for (key, value) in overlay {
    match (base.get_mut(key), value) {
      (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
      _ => {
        base.insert(key.clone(), value.clone());
      }
    }
  }
}

/// Build a nested table from a dotted key, e.g. `session.max_tokens`.
pub fn table_from_dotted_key(key: &str, value: Value) -> Value {
  key
    .rsplit('.')
    .fold(value, |inner, segment| {
      let mut table = Map::new();
      table.insert(segment.to_string(), inner);
      Value::Table(table)
    })
}
