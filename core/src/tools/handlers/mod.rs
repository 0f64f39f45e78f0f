pub mod bash;
pub mod edit_file;
pub mod glob_files;
pub mod grep_files;
pub mod list_dir;
pub mod read_file;
pub mod think;
pub mod write_file;

use std::time::Duration;

use crate::tools::registry::ToolRegistry;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use glob_files::GlobTool;
pub use grep_files::GrepTool;
pub use list_dir::ListDirTool;
pub use read_file::ReadFileTool;
pub use think::ThinkTool;
pub use write_file::WriteFileTool;

pub fn register_builtin_tools(registry: &mut ToolRegistry) {
  register_builtin_tools_with_timeout(registry, bash::DEFAULT_TIMEOUT);
}

/// Same as [`register_builtin_tools`] with a custom default shell timeout.
pub fn register_builtin_tools_with_timeout(registry: &mut ToolRegistry, bash_timeout: Duration) {
  registry.register_tool(move || BashTool::new(bash_timeout));
  registry.register_tool(|| ReadFileTool);
  registry.register_tool(|| WriteFileTool);
  registry.register_tool(|| EditFileTool);
  registry.register_tool(|| ListDirTool);
  registry.register_tool(|| GrepTool);
  registry.register_tool(|| GlobTool);
  registry.register_tool(|| ThinkTool);
}
