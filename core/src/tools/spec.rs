use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON schema representation for tool arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
  String {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    enum_values: Option<Vec<String>>,
  },
  Number {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
  },
  Integer {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
  },
  Boolean {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
  },
  Array {
    items: Box<JsonSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
  },
  Object {
    properties: BTreeMap<String, JsonSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<String>>,
  },
}

impl JsonSchema {
  pub fn to_value(&self) -> serde_json::Value {
    serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
  }

  pub fn string(description: &str) -> Self {
    JsonSchema::String {
      description: Some(description.to_string()),
      enum_values: None,
    }
  }

  pub fn string_enum(description: &str, values: &[&str]) -> Self {
    JsonSchema::String {
      description: Some(description.to_string()),
      enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
    }
  }

  pub fn number(description: &str) -> Self {
    JsonSchema::Number {
      description: Some(description.to_string()),
    }
  }

  pub fn integer(description: &str) -> Self {
    JsonSchema::Integer {
      description: Some(description.to_string()),
    }
  }

  pub fn boolean(description: &str) -> Self {
    JsonSchema::Boolean {
      description: Some(description.to_string()),
    }
  }

  pub fn string_array(description: &str) -> Self {
    JsonSchema::Array {
      items: Box::new(JsonSchema::String {
        description: None,
        enum_values: None,
      }),
      description: Some(description.to_string()),
    }
  }
}

/// Object schema from `(name, schema)` pairs plus the required field names.
pub fn obj(properties: Vec<(&str, JsonSchema)>, required: &[&str]) -> JsonSchema {
  JsonSchema::Object {
    properties: properties
      .into_iter()
      .map(|(name, schema)| (name.to_string(), schema))
      .collect(),
    required: if required.is_empty() {
      None
    } else {
      Some(required.iter().map(|name| name.to_string()).collect())
    },
  }
}
