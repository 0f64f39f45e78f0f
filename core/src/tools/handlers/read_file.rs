use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
  file_path: String,
  #[serde(default)]
  offset: Option<usize>,
  #[serde(default)]
  limit: Option<usize>,
}

impl ToolArgs for ReadFileArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("file_path", &self.file_path)?;
    if self.limit == Some(0) {
      return Err(ToolError::Validation("limit must be positive".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadKind {
  Text,
  Image,
  Error,
}

#[derive(Debug, Serialize)]
pub struct ReadFileOutput {
  #[serde(rename = "type")]
  pub kind: ReadKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ReadFileOutput {
  fn error(message: impl Into<String>) -> Self {
    Self {
      kind: ReadKind::Error,
      content: None,
      error: Some(message.into()),
    }
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Lines are split on `\n`; an offset past the end gives an empty slice.
fn slice_lines(content: &str, offset: usize, limit: Option<usize>) -> String {
  let lines: Vec<&str> = content.split('\n').collect();
  let start = offset.min(lines.len());
  let end = match limit {
    Some(limit) => start.saturating_add(limit).min(lines.len()),
    None => lines.len(),
  };
  lines[start..end].join("\n")
}

async fn read(path: &Path, args: &ReadFileArgs) -> ReadFileOutput {
  match tokio::fs::metadata(path).await {
    Ok(meta) if meta.is_dir() => return ReadFileOutput::error("Path is a directory"),
    Ok(_) => {}
    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
      return ReadFileOutput::error("File does not exist");
    }
    Err(err) => return ReadFileOutput::error(err.to_string()),
  }

  if is_image(path) {
    return ReadFileOutput {
      kind: ReadKind::Image,
      content: Some(format!("[image file: {}]", path.display())),
      error: None,
    };
  }

  match tokio::fs::read(path).await {
    Ok(bytes) => {
      let content = String::from_utf8_lossy(&bytes);
      ReadFileOutput {
        kind: ReadKind::Text,
        content: Some(slice_lines(&content, args.offset.unwrap_or(0), args.limit)),
        error: None,
      }
    }
    Err(err) => ReadFileOutput::error(err.to_string()),
  }
}

#[async_trait]
impl Tool for ReadFileTool {
  fn name(&self) -> &'static str {
    "read_file"
  }

  fn description(&self) -> &'static str {
    "Read a text file, optionally starting at a 0-based line offset and limited to a number of lines."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("file_path", JsonSchema::string("Path of the file to read")),
        ("offset", JsonSchema::integer("0-based line to start from")),
        ("limit", JsonSchema::integer("Maximum number of lines to return")),
      ],
      &["file_path"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<ReadFileArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: ReadFileArgs = decode(self.name(), input)?;
    let output = read(&ctx.resolve_path(&args.file_path), &args).await;
    serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
  }

  fn is_read_only(&self) -> bool {
    true
  }
}
