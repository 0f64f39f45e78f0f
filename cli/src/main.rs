// Kode CLI - Command Line Interface Entry Point

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kode_config::{Config, ConfigLoader, ProjectConfig, parse_override};
use kode_core::model::ToolInput;
use kode_core::{ToolContext, ToolError, ToolRegistry, build_default_tools};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Kode - tool runtime for an agent session loop
#[derive(Parser, Debug)]
#[command(name = "kode")]
#[command(version, about, long_about = None)]
struct TopCli {
  #[clap(flatten)]
  config_overrides: CliConfigOverrides,

  #[clap(subcommand)]
  command: Commands,

  /// Project directory (default: current directory)
  #[arg(short = 'C', long = "dir", global = true)]
  dir: Option<PathBuf>,

  /// Log at debug level unless RUST_LOG says otherwise
  #[arg(short = 'v', long = "verbose", global = true)]
  verbose: bool,
}

/// CLI configuration overrides
#[derive(Debug, clap::Args)]
struct CliConfigOverrides {
  /// Configuration override in key=value format, e.g. -c tools.bash_timeout_secs=60
  #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
  overrides: Vec<String>,
}

impl CliConfigOverrides {
  fn parse(&self) -> Result<Vec<(String, String)>> {
    self
      .overrides
      .iter()
      .map(|raw| parse_override(raw).map_err(anyhow::Error::from))
      .collect()
  }
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
  /// List registered tools
  Tools {
    /// Only tools without side effects
    #[arg(long)]
    read_only: bool,

    /// Print declarations as JSON
    #[arg(long)]
    json: bool,
  },

  /// Validate and run a single tool call
  Exec {
    /// Tool name
    tool: String,

    /// Tool input as a JSON object
    #[arg(short = 'i', long = "input", default_value = "{}")]
    input: String,

    /// Abandon the call after this many seconds
    #[arg(long)]
    timeout_secs: Option<f64>,
  },

  /// Configuration management
  Config {
    #[command(subcommand)]
    config_command: ConfigCommands,
  },
}

/// Configuration commands
#[derive(Debug, Subcommand)]
enum ConfigCommands {
  /// Show the merged configuration
  Show,

  /// Validate the merged configuration
  Validate,

  /// Mark a tool as approved for this project
  Approve {
    /// Tool name
    tool: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = TopCli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    )
    .with_writer(std::io::stderr)
    .init();

  let project_dir = match cli.dir {
    Some(dir) => dir,
    None => std::env::current_dir().context("cannot determine current directory")?,
  };
  let overrides = cli.config_overrides.parse()?;
  debug!(project = %project_dir.display(), overrides = overrides.len(), "kode starting");

  match cli.command {
    Commands::Tools { read_only, json } => {
      let config = load_config(&project_dir, &overrides)?;
      list_tools(&config, read_only, json)
    }
    Commands::Exec {
      tool,
      input,
      timeout_secs,
    } => {
      let config = load_config(&project_dir, &overrides)?;
      run_exec(&config, &project_dir, &tool, &input, timeout_secs).await
    }
    Commands::Config { config_command } => {
      handle_config_command(config_command, &project_dir, &overrides)
    }
  }
}

fn load_config(project_dir: &Path, overrides: &[(String, String)]) -> Result<Config> {
  ConfigLoader::new()
    .with_project_dir(project_dir.to_path_buf())
    .load_with_cli_overrides(overrides)
    .context("failed to load configuration")
}

/// List registered tools
fn list_tools(config: &Config, read_only: bool, as_json: bool) -> Result<()> {
  let mut registry = build_default_tools(config);
  if read_only {
    registry = registry.read_only();
  }

  if as_json {
    println!("{}", serde_json::to_string_pretty(&registry.declarations())?);
    return Ok(());
  }

  for tool in registry.get_all_tools() {
    let marker = if tool.is_read_only() { "ro" } else { "rw" };
    let approved = if config.is_tool_approved(tool.name()) {
      " (approved)"
    } else {
      ""
    };
    println!("  {:<12} [{marker}] {}{approved}", tool.name(), tool.description());
  }
  Ok(())
}

fn parse_input(raw: &str) -> Result<ToolInput> {
  match serde_json::from_str::<Value>(raw).context("--input is not valid JSON")? {
    Value::Object(map) => Ok(map),
    other => bail!("--input must be a JSON object, got {other}"),
  }
}

/// Look up, validate and execute one tool outside a session.
async fn exec_tool(
  registry: &ToolRegistry,
  name: &str,
  input: &ToolInput,
  ctx: &ToolContext,
) -> Result<Result<Value, ToolError>> {
  let Some(tool) = registry.get_tool(name) else {
    bail!("unknown tool: {name} (available: {})", registry.names().join(", "));
  };
  if let Err(err) = tool.validate_input(input) {
    return Ok(Err(err));
  }
  Ok(tool.execute(ctx, input).await)
}

async fn run_exec(
  config: &Config,
  project_dir: &Path,
  tool: &str,
  raw_input: &str,
  timeout_secs: Option<f64>,
) -> Result<()> {
  let registry = build_default_tools(config);
  let input = parse_input(raw_input)?;
  let cancel = CancellationToken::new();
  let ctx = ToolContext::new(project_dir, cancel.clone());

  let watcher = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling tool");
      watcher.cancel();
    }
  });
  if let Some(secs) = timeout_secs {
    if !(secs.is_finite() && secs > 0.0) {
      bail!("--timeout-secs must be a positive number");
    }
    let deadline = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_secs_f64(secs)).await;
      deadline.cancel();
    });
  }

  info!(tool, "executing");
  match exec_tool(&registry, tool, &input, &ctx).await? {
    Ok(output) => {
      println!("{}", serde_json::to_string_pretty(&output)?);
      Ok(())
    }
    Err(err) => {
      println!("{}", serde_json::to_string_pretty(&err.to_payload())?);
      bail!("{tool} failed: {err}")
    }
  }
}

/// Handle config commands
fn handle_config_command(
  cmd: ConfigCommands,
  project_dir: &Path,
  overrides: &[(String, String)],
) -> Result<()> {
  match cmd {
    ConfigCommands::Show => {
      let config = load_config(project_dir, overrides)?;
      print!("{}", toml::to_string_pretty(&config)?);
    }
    ConfigCommands::Validate => {
      let config = load_config(project_dir, overrides)?;
      println!(
        "Configuration is valid ({} / {}).",
        config.models.provider, config.models.model
      );
    }
    ConfigCommands::Approve { tool } => {
      let config = load_config(project_dir, overrides)?;
      if !build_default_tools(&config).contains(&tool) {
        bail!("unknown tool: {tool}");
      }
      let project = ProjectConfig::for_project(project_dir);
      if project.approve_tool(&tool)? {
        println!("Approved {tool} in {}", project.path().display());
      } else {
        println!("{tool} is already approved");
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_exec_with_global_flags() {
    let cli = TopCli::try_parse_from([
      "kode",
      "-C",
      "/tmp/project",
      "exec",
      "read_file",
      "--input",
      r#"{"file_path":"a.txt"}"#,
      "-c",
      "tools.bash_timeout_secs=5",
    ])
    .expect("parse");
    assert_eq!(cli.dir, Some(PathBuf::from("/tmp/project")));
    assert_eq!(
      cli.config_overrides.parse().expect("overrides"),
      vec![("tools.bash_timeout_secs".to_string(), "5".to_string())]
    );
    assert!(matches!(cli.command, Commands::Exec { ref tool, .. } if tool == "read_file"));
  }

  #[test]
  fn input_must_be_an_object() {
    assert!(parse_input("[1, 2]").is_err());
    assert!(parse_input("not json").is_err());
    assert_eq!(parse_input("{}").expect("empty object").len(), 0);
  }

  #[tokio::test]
  async fn exec_runs_validation_before_execution() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.txt"), "hello").expect("fixture");
    let registry = ToolRegistry::with_default_tools();
    let ctx = ToolContext::new(dir.path(), CancellationToken::new());

    let ok = exec_tool(
      &registry,
      "read_file",
      &parse_input(r#"{"file_path":"a.txt"}"#).expect("input"),
      &ctx,
    )
    .await
    .expect("known tool");
    assert_eq!(ok.expect("read")["content"], "hello");

    let invalid = exec_tool(&registry, "read_file", &ToolInput::new(), &ctx)
      .await
      .expect("known tool");
    assert!(invalid.is_err_and(|err| err.is_validation()));

    assert!(
      exec_tool(&registry, "nope", &ToolInput::new(), &ctx)
        .await
        .is_err()
    );
  }
}
