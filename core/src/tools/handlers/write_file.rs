use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
  file_path: String,
  content: String,
  #[serde(default)]
  append: bool,
  /// Defaults to `append`
  #[serde(default)]
  leading_newline: Option<bool>,
  /// Defaults to true; only applies when not appending
  #[serde(default)]
  trailing_newline: Option<bool>,
}

impl ToolArgs for WriteFileArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("file_path", &self.file_path)
  }
}

impl WriteFileArgs {
  fn payload(&self) -> String {
    let mut payload = String::with_capacity(self.content.len() + 2);
    if self.leading_newline.unwrap_or(self.append) {
      payload.push('\n');
    }
    payload.push_str(&self.content);
    if self.trailing_newline.unwrap_or(true) && !self.append {
      payload.push('\n');
    }
    payload
  }
}

#[async_trait]
impl Tool for WriteFileTool {
  fn name(&self) -> &'static str {
    "write_file"
  }

  fn description(&self) -> &'static str {
    "Write or append text to a file, creating parent directories as needed. Overwrites end with \
     a newline by default; appends start with one by default."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("file_path", JsonSchema::string("Path of the file to write")),
        ("content", JsonSchema::string("Text to write")),
        ("append", JsonSchema::boolean("Append instead of overwriting")),
        (
          "leading_newline",
          JsonSchema::boolean("Prefix a newline (defaults to the value of append)"),
        ),
        (
          "trailing_newline",
          JsonSchema::boolean("Suffix a newline when overwriting (default true)"),
        ),
      ],
      &["file_path", "content"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<WriteFileArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: WriteFileArgs = decode(self.name(), input)?;
    let path = ctx.resolve_path(&args.file_path);

    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(|e| {
        ToolError::Execution(format!("Failed to create directory {}: {e}", parent.display()))
      })?;
    }

    let payload = args.payload();
    let written = if args.append {
      let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| ToolError::Execution(format!("Failed to open {}: {e}", path.display())))?;
      file.write_all(payload.as_bytes()).await.and(file.flush().await)
    } else {
      tokio::fs::write(&path, payload.as_bytes()).await
    };
    written.map_err(|e| ToolError::Execution(format!("Failed to write {}: {e}", path.display())))?;

    Ok(json!({ "success": true, "bytes_written": payload.len() }))
  }

  fn is_read_only(&self) -> bool {
    false
  }
}
