use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ToolInput;
use crate::tools::context::{ToolArgs, ToolContext, ToolError, decode, require_non_empty};
use crate::tools::registry::Tool;
use crate::tools::spec::{JsonSchema, obj};

pub struct GlobTool;

#[derive(Debug, Deserialize)]
struct GlobArgs {
  pattern: String,
  #[serde(default)]
  base_dir: Option<String>,
}

impl ToolArgs for GlobArgs {
  fn validate(&self) -> Result<(), ToolError> {
    require_non_empty("pattern", &self.pattern)?;
    glob::Pattern::new(&self.pattern)
      .map_err(|e| ToolError::Validation(format!("invalid glob pattern: {e}")))?;
    Ok(())
  }
}

#[derive(Debug, Default, Serialize)]
pub struct GlobOutput {
  pub files: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

fn has_separator(pattern: &str) -> bool {
  pattern.contains('/') || pattern.contains(MAIN_SEPARATOR)
}

/// Patterns without a separator search the whole tree under `base`.
fn full_pattern(base: &Path, pattern: &str) -> String {
  if Path::new(pattern).is_absolute() {
    return pattern.to_string();
  }
  let base = glob::Pattern::escape(&base.to_string_lossy());
  if has_separator(pattern) {
    format!("{base}/{pattern}")
  } else {
    format!("{base}/**/{pattern}")
  }
}

fn find(cwd: &Path, args: &GlobArgs) -> GlobOutput {
  let base = match args.base_dir.as_deref() {
    Some(dir) if !dir.is_empty() => {
      if Path::new(dir).is_absolute() {
        PathBuf::from(dir)
      } else {
        cwd.join(dir)
      }
    }
    _ => cwd.to_path_buf(),
  };
  if !base.is_dir() {
    return GlobOutput {
      files: Vec::new(),
      error: Some("Base directory does not exist".to_string()),
    };
  }

  let paths = match glob::glob(&full_pattern(&base, &args.pattern)) {
    Ok(paths) => paths,
    Err(err) => {
      return GlobOutput {
        files: Vec::new(),
        error: Some(format!("Invalid pattern: {err}")),
      };
    }
  };

  let mut files: Vec<String> = paths
    .filter_map(Result::ok)
    .filter(|path| path.is_file())
    .map(|path| {
      path
        .strip_prefix(cwd)
        .map(Path::to_path_buf)
        .unwrap_or(path)
        .display()
        .to_string()
    })
    .collect();
  files.sort();
  files.dedup();
  GlobOutput { files, error: None }
}

#[async_trait]
impl Tool for GlobTool {
  fn name(&self) -> &'static str {
    "glob"
  }

  fn description(&self) -> &'static str {
    "Find files by shell glob pattern. A pattern without a path separator matches at any depth \
     below the base directory. Directories are not returned."
  }

  fn argument_schema(&self) -> JsonSchema {
    obj(
      vec![
        ("pattern", JsonSchema::string("Glob pattern, e.g. *.rs or src/**/*.toml")),
        (
          "base_dir",
          JsonSchema::string("Directory to search from (default: project directory)"),
        ),
      ],
      &["pattern"],
    )
  }

  fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
    decode::<GlobArgs>(self.name(), input).map(|_| ())
  }

  async fn execute(&self, ctx: &ToolContext, input: &ToolInput) -> Result<Value, ToolError> {
    let args: GlobArgs = decode(self.name(), input)?;
    let cwd = ctx.cwd.clone();
    let output = tokio::task::spawn_blocking(move || find(&cwd, &args))
      .await
      .map_err(|e| ToolError::Execution(format!("glob task failed: {e}")))?;
    serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
  }

  fn is_read_only(&self) -> bool {
    true
  }
}
