//! Built-in tool implementations for Codewright.
//!
//! Tools give the assistant the ability to act on a project:
//! create, read, search and edit files, and drive the `mify` code
//! generator. Every path is scoped to the configured workspace.

pub mod file_read;
pub mod file_write;
pub mod mify;
pub mod workspace;

use codewright_config::ToolsConfig;
use codewright_core::tool::ToolRegistry;

pub use mify::MifyCli;
pub use workspace::Workspace;

/// Create the tool registry the assistant is offered.
///
/// Registration order is the declaration order the model sees.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let workspace = Workspace::new(&config.workspace_root, config.restrict_to_workspace);
    let cli = MifyCli::new(&config.mify_binary);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(file_write::CreateFolderTool::new(workspace.clone())));
    registry.register(Box::new(file_write::CreateFileTool::new(workspace.clone())));
    registry.register(Box::new(file_read::SearchFileTool::new(workspace.clone())));
    registry.register(Box::new(file_write::EditFileTool::new(workspace.clone())));
    registry.register(Box::new(file_read::ReadFileTool::new(workspace.clone())));
    registry.register(Box::new(file_read::ListFilesTool::new(workspace.clone())));
    registry.register(Box::new(mify::CreateWorkspaceTool::new(workspace.clone(), cli.clone())));
    registry.register(Box::new(mify::CreateServiceTool::new(workspace.clone(), cli.clone())));
    registry.register(Box::new(mify::AddClientTool::new(workspace.clone(), cli.clone())));
    registry.register(Box::new(mify::MifyGenerateTool::new(workspace, cli)));
    registry
}
