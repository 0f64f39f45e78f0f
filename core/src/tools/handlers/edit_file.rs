use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub struct EditFileTool;

#[derive(Debug, Deserialize)]
struct EditFileArgs {
  file_path: String,
  old_text: String,
  new_text: String,
}

impl ToolArgs for EditFileArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("file_path", &self.file_path)?;
    if self.old_text.is_empty() {
      return Err(ToolError::Validation("old_text must not be empty".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl Tool for EditFileTool {
  fn name(&self) -> &'static str {
    "edit_file"
  }

  fn description(&self) -> &'static str {
    "Replace every occurrence of an exact text snippet in a file. Matching is literal, not regex; \
     the call fails if the snippet is not present."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("file_path", JsonSchema::string("Path of the file to edit")),
        ("old_text", JsonSchema::string("Exact text to replace")),
        ("new_text", JsonSchema::string("Replacement text")),
      ],
      &["file_path", "old_text", "new_text"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<EditFileArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: EditFileArgs = decode(self.name(), input)?;
    let path = ctx.resolve_path(&args.file_path);

    let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        ToolError::Execution(format!("File does not exist: {}", path.display()))
      } else {
        ToolError::Execution(format!("Failed to read file {}: {e}", path.display()))
      }
    })?;

    let replacements = content.matches(args.old_text.as_str()).count();
    if replacements == 0 {
      return Err(ToolError::TextNotFound { path });
    }

    let updated = content.replace(&args.old_text, &args.new_text);
    tokio::fs::write(&path, updated)
      .await
      .map_err(|e| ToolError::Execution(format!("Failed to write file {}: {e}", path.display())))?;
    debug!(path = %path.display(), replacements, "edited file");

    Ok(json!({ "success": true, "replacements": replacements }))
  }

  fn is_read_only(&self) -> bool {
    false
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn input(value: Value) -> ToolInput {
    match value {
      Value::Object(map) => map,
      _ => ToolInput::new(),
    }
  }

  #[tokio::test]
  async fn replaces_all_literal_occurrences() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.rs"), "let x = a.b; // a.b\nlet y = axb;\n").expect("fixture");
    let ctx = ToolContext::new(dir.path(), Default::default());

    let out = EditFileTool
      .execute(
        &ctx,
        &input(json!({ "file_path": "a.rs", "old_text": "a.b", "new_text": "c" })),
      )
      .await
      .expect("edit");
    assert_eq!(out, json!({ "success": true, "replacements": 2 }));
    assert_eq!(
      std::fs::read_to_string(dir.path().join("a.rs")).expect("read back"),
      "let x = c; // c\nlet y = axb;\n"
    );
  }

  #[tokio::test]
  async fn absent_text_fails_and_leaves_file_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "unchanged\n").expect("fixture");
    let ctx = ToolContext::new(dir.path(), Default::default());

    let result = EditFileTool
      .execute(
        &ctx,
        &input(json!({ "file_path": "a.txt", "old_text": "missing", "new_text": "x" })),
      )
      .await;
    assert_eq!(result, Err(ToolError::TextNotFound { path: path.clone() }));
    assert_eq!(std::fs::read_to_string(&path).expect("read back"), "unchanged\n");
  }

  #[tokio::test]
  async fn missing_file_is_an_execution_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = ToolContext::new(dir.path(), Default::default());
    let result = EditFileTool
      .execute(
        &ctx,
        &input(json!({ "file_path": "gone.txt", "old_text": "a", "new_text": "b" })),
      )
      .await;
    assert!(matches!(result, Err(ToolError::Execution(msg)) if msg.contains("does not exist")));
  }

  #[test]
  fn empty_old_text_is_rejected() {
    let result = EditFileTool.validate_input(&input(json!({
      "file_path": "a.txt",
      "old_text": "",
      "new_text": "b"
    })));
    assert!(matches!(result, Err(ToolError::Validation(_))));
  }
}
