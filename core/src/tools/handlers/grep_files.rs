use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub const DEFAULT_MAX_MATCHES: usize = 100;

pub struct GrepTool;

/// `file_paths` may be a single string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FilePaths {
  One(String),
  Many(Vec<String>),
}

impl FilePaths {
  fn non_empty(&self) -> Vec<&str> {
    let paths: &[String] = match self {
      FilePaths::One(path) => std::slice::from_ref(path),
      FilePaths::Many(paths) => paths,
    };
    paths
      .iter()
      .map(String::as_str)
      .filter(|path| !path.is_empty())
      .collect()
  }
}

#[derive(Debug, Deserialize)]
struct GrepArgs {
  pattern: String,
  file_paths: FilePaths,
  #[serde(default)]
  max_matches: Option<usize>,
}

impl ToolArgs for GrepArgs {
  fn validate(&self) -> Result<(), ToolError> {
    if self.pattern.is_empty() {
      return Err(ToolError::Validation("pattern must not be empty".to_string()));
    }
    if self.file_paths.non_empty().is_empty() {
      return Err(ToolError::Validation(
        "file_paths must be a non-empty string or array of strings".to_string(),
      ));
    }
    if self.max_matches == Some(0) {
      return Err(ToolError::Validation("max_matches must be positive".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrepMatch {
  pub file: String,
  /// 1-based
  pub line: usize,
  pub content: String,
}

#[derive(Debug, Default, Serialize)]
pub struct GrepOutput {
  pub matches: Vec<GrepMatch>,
  /// The match cap was reached and scanning stopped there. Also set when
  /// the last match found happens to be the last one in the files.
  pub truncated: bool,
  pub files_searched: usize,
}

/// Expand one `file_paths` entry. Entries that are not valid globs or match
/// nothing are taken literally.
fn resolve_entry(cwd: &Path, entry: &str) -> Vec<(PathBuf, String)> {
  let relative = !Path::new(entry).is_absolute();
  let pattern = if relative {
    format!(
      "{}/{}",
      glob::Pattern::escape(&cwd.to_string_lossy()),
      entry
    )
  } else {
    entry.to_string()
  };

  let mut paths: Vec<PathBuf> = glob::glob(&pattern)
    .map(|paths| paths.filter_map(Result::ok).collect())
    .unwrap_or_default();
  if paths.is_empty() {
    paths.push(if relative {
      cwd.join(entry)
    } else {
      PathBuf::from(entry)
    });
  }

  paths
    .into_iter()
    .map(|path| {
      let shown = if relative {
        path.strip_prefix(cwd).unwrap_or(&path).display().to_string()
      } else {
        path.display().to_string()
      };
      (path, shown)
    })
    .collect()
}

fn search(cwd: &Path, args: &GrepArgs) -> GrepOutput {
  let max_matches = args.max_matches.unwrap_or(DEFAULT_MAX_MATCHES);
  let mut output = GrepOutput::default();
  // Overlapping entries name the same file once, at its first position.
  let mut seen = HashSet::new();

  for entry in args.file_paths.non_empty() {
    for (path, shown) in resolve_entry(cwd, entry) {
      if !seen.insert(path.clone()) || !path.is_file() {
        continue;
      }
      let Ok(bytes) = std::fs::read(&path) else {
        debug!(path = %path.display(), "skipping unreadable file");
        continue;
      };
      output.files_searched += 1;

      let content = String::from_utf8_lossy(&bytes);
      for (index, line) in content.split('\n').enumerate() {
        if !line.contains(args.pattern.as_str()) {
          continue;
        }
        output.matches.push(GrepMatch {
          file: shown.clone(),
          line: index + 1,
          content: line.to_string(),
        });
        if output.matches.len() >= max_matches {
          output.truncated = true;
          return output;
        }
      }
    }
  }
  output
}

#[async_trait]
impl Tool for GrepTool {
  fn name(&self) -> &'static str {
    "grep"
  }

  fn description(&self) -> &'static str {
    "Search files for lines containing a literal text pattern. Accepts file paths or glob \
     patterns; results are capped at max_matches across all files."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("pattern", JsonSchema::string("Literal text to search for")),
        (
          "file_paths",
          JsonSchema::string_array("Files or glob patterns to search (a single string is accepted)"),
        ),
        (
          "max_matches",
          JsonSchema::integer("Maximum number of matches to return (default 100)"),
        ),
      ],
      &["pattern", "file_paths"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<GrepArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: GrepArgs = decode(self.name(), input)?;
    let cwd = ctx.cwd.clone();
    let output = tokio::task::spawn_blocking(move || search(&cwd, &args))
      .await
      .map_err(|e| ToolError::Execution(format!("search task failed: {e}")))?;
    serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
  }

  fn is_read_only(&self) -> bool {
    true
  }
}
