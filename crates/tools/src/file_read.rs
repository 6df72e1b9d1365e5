//! Read-only file tools: read a file, search it by pattern, list a folder.
//!
//! Filesystem failures come back as result text so the model can react to
//! them; only refused paths and malformed arguments are errors.

use crate::workspace::Workspace;
use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::{Tool, ToolOutput, parse_arguments};
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

/// Read the full contents of a file.
pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the specified path. Use this when you need to examine the contents of an existing file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: PathArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(path = %resolved.display(), "read_file");

        Ok(match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => ToolOutput::text(content),
            Err(e) => ToolOutput::text(format!("Error reading file: {e}")),
        })
    }
}

/// Report the 1-based line numbers matching a regular expression.
pub struct SearchFileTool {
    workspace: Workspace,
}

impl SearchFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    path: String,
    search_pattern: String,
}

/// Line numbers (1-based) of every line matching `pattern`.
fn matching_lines(content: &str, pattern: &regex_lite::Regex) -> Vec<usize> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| pattern.is_match(line))
        .map(|(i, _)| i + 1)
        .collect()
}

#[async_trait]
impl Tool for SearchFileTool {
    fn name(&self) -> &str {
        "search_file"
    }

    fn description(&self) -> &str {
        "Search for a specific pattern in a file and return the line numbers where the pattern is found. Use this to locate specific code or text within a file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to search"
                },
                "search_pattern": {
                    "type": "string",
                    "description": "The pattern to search for in the file"
                }
            },
            "required": ["path", "search_pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: SearchArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(path = %resolved.display(), pattern = %args.search_pattern, "search_file");

        let pattern = match regex_lite::Regex::new(&args.search_pattern) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutput::text(format!("Error searching file: {e}"))),
        };

        Ok(match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => ToolOutput::text(format!(
                "Matches found at lines: {:?}",
                matching_lines(&content, &pattern)
            )),
            Err(e) => ToolOutput::text(format!("Error searching file: {e}")),
        })
    }
}

/// List the entries of a folder.
pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default = "current_dir")]
    path: String,
}

fn current_dir() -> String {
    ".".into()
}

async fn entry_names(dir: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List all files and directories in the specified folder. Use this when you need to see the contents of a directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the folder to list (default: current directory)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: ListArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(path = %resolved.display(), "list_files");

        Ok(match entry_names(&resolved).await {
            Ok(names) => ToolOutput::text(names.join("\n")),
            Err(e) => ToolOutput::text(format!("Error listing files: {e}")),
        })
    }
}
