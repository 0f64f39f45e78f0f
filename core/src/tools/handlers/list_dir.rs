use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub struct ListDirTool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SortBy {
  #[default]
  Name,
  Size,
  /// Directories first, then by name
  Type,
}

#[derive(Debug, Deserialize)]
struct ListDirArgs {
  #[serde(default)]
  path: Option<String>,
  #[serde(default)]
  show_hidden: bool,
  #[serde(default)]
  sort_by: SortBy,
}

impl ToolArgs for ListDirArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
  pub name: String,
  pub path: String,
  pub is_dir: bool,
  pub size: u64,
  /// Includes the leading dot; empty for directories and extensionless files
  #[serde(skip_serializing_if = "String::is_empty")]
  pub extension: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ListDirOutput {
  pub entries: Vec<DirEntry>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

fn extension_of(path: &Path) -> String {
  path
    .extension()
    .map(|ext| format!(".{}", ext.to_string_lossy()))
    .unwrap_or_default()
}

fn sort_entries(entries: &mut [DirEntry], sort_by: SortBy) {
  entries.sort_by(|a, b| match sort_by {
    SortBy::Name => a.name.cmp(&b.name),
    SortBy::Size => a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)),
    SortBy::Type => match (a.is_dir, b.is_dir) {
      (true, false) => Ordering::Less,
      (false, true) => Ordering::Greater,
      _ => a.name.cmp(&b.name),
    },
  });
}

async fn list(dir: &Path, args: &ListDirArgs) -> ListDirOutput {
  let meta = match tokio::fs::metadata(dir).await {
    Ok(meta) => meta,
    Err(err) => {
      return ListDirOutput {
        entries: Vec::new(),
        error: Some(format!(
          "Directory does not exist or cannot be accessed: {err}"
        )),
      };
    }
  };

  if !meta.is_dir() {
    let entry = DirEntry {
      name: dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default(),
      path: dir.display().to_string(),
      is_dir: false,
      size: meta.len(),
      extension: extension_of(dir),
    };
    return ListDirOutput {
      entries: vec![entry],
      error: None,
    };
  }

  let mut read_dir = match tokio::fs::read_dir(dir).await {
    Ok(read_dir) => read_dir,
    Err(err) => {
      return ListDirOutput {
        entries: Vec::new(),
        error: Some(format!("Failed to read directory: {err}")),
      };
    }
  };

  let mut entries = Vec::new();
  loop {
    let entry = match read_dir.next_entry().await {
      Ok(Some(entry)) => entry,
      Ok(None) => break,
      Err(err) => {
        return ListDirOutput {
          entries,
          error: Some(format!("Failed to read directory: {err}")),
        };
      }
    };
    let name = entry.file_name().to_string_lossy().into_owned();
    if !args.show_hidden && name.starts_with('.') {
      continue;
    }
    // Entries can vanish between read_dir and stat.
    let Ok(meta) = entry.metadata().await else {
      continue;
    };
    let path = entry.path();
    entries.push(DirEntry {
      extension: if meta.is_dir() {
        String::new()
      } else {
        extension_of(&path)
      },
      name,
      path: path.display().to_string(),
      is_dir: meta.is_dir(),
      size: meta.len(),
    });
  }

  sort_entries(&mut entries, args.sort_by);
  ListDirOutput {
    entries,
    error: None,
  }
}

#[async_trait]
impl Tool for ListDirTool {
  fn name(&self) -> &'static str {
    "list_dir"
  }

  fn description(&self) -> &'static str {
    "List the entries of a directory (or describe a single file) with name, path, type, size and extension."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        (
          "path",
          JsonSchema::string("Directory or file to list (default: project directory)"),
        ),
        (
          "show_hidden",
          JsonSchema::boolean("Include entries whose names start with a dot"),
        ),
        (
          "sort_by",
          JsonSchema::string_enum("Sort order", &["name", "size", "type"]),
        ),
      ],
      &[],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<ListDirArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: ListDirArgs = decode(self.name(), input)?;
    let dir = match args.path.as_deref() {
      Some(path) if !path.is_empty() => ctx.resolve_path(path),
      _ => ctx.cwd.clone(),
    };
    let output = list(&dir, &args).await;
    serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
  }

  fn is_read_only(&self) -> bool {
    true
  }
}
