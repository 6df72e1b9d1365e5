//! Mutating file tools: create folders and files, edit a line range.

use crate::workspace::Workspace;
use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::{Tool, ToolOutput, parse_arguments};
use serde::Deserialize;
use similar::{ChangeTag, TextDiff};
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

/// Create a folder and any missing parents.
pub struct CreateFolderTool {
    workspace: Workspace,
}

impl CreateFolderTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateFolderTool {
    fn name(&self) -> &str {
        "create_folder"
    }

    fn description(&self) -> &str {
        "Create a new folder at the specified path. Use this when you need to create a new directory in the project structure."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path where the folder should be created"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: PathArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(path = %resolved.display(), "create_folder");

        Ok(match tokio::fs::create_dir_all(&resolved).await {
            Ok(()) => ToolOutput::text(format!("Folder created: {}", args.path)),
            Err(e) => ToolOutput::text(format!("Error creating folder: {e}")),
        })
    }
}

/// Write a file, creating parent folders as needed.
pub struct CreateFileTool {
    workspace: Workspace,
}

impl CreateFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct CreateFileArgs {
    path: String,
    #[serde(default)]
    content: String,
}

async fn write_with_parents(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file at the specified path with content. Use this when you need to create a new file in the project structure."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path where the file should be created"
                },
                "content": {
                    "type": "string",
                    "description": "The content of the file"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: CreateFileArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(path = %resolved.display(), bytes = args.content.len(), "create_file");

        Ok(match write_with_parents(&resolved, &args.content).await {
            Ok(()) => ToolOutput::text(format!("File created: {}", args.path)),
            Err(e) => ToolOutput::text(format!("Error creating file: {e}")),
        })
    }
}

/// Replace an inclusive 1-based line range with new content.
pub struct EditFileTool {
    workspace: Workspace,
}

impl EditFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    start_line: i64,
    end_line: i64,
    new_content: String,
}

/// Splice `replacement` over lines `start..=end` (1-based) of `original`.
///
/// Out-of-range bounds clamp to the file, so `start` past the end appends
/// and `end < start` inserts before `start`. A replacement that would run
/// into the next line gets its missing newline.
fn splice_lines(original: &str, start: usize, end: usize, replacement: &str) -> String {
    let lines: Vec<&str> = original.split_inclusive('\n').collect();
    let from = (start - 1).min(lines.len());
    let to = end.clamp(from, lines.len());

    let mut out = String::with_capacity(original.len() + replacement.len() + 1);
    for line in &lines[..from] {
        out.push_str(line);
    }
    out.push_str(replacement);
    if to < lines.len() && !replacement.is_empty() && !replacement.ends_with('\n') {
        out.push('\n');
    }
    for line in &lines[to..] {
        out.push_str(line);
    }
    out
}

/// Counts of inserted and deleted lines between two texts.
fn diff_stats(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a specific range of lines in a file. Use this after using search_file to identify the lines you want to edit."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to edit"
                },
                "start_line": {
                    "type": "integer",
                    "description": "The starting line number of the edit"
                },
                "end_line": {
                    "type": "integer",
                    "description": "The ending line number of the edit"
                },
                "new_content": {
                    "type": "string",
                    "description": "The new content to replace the specified lines"
                }
            },
            "required": ["path", "start_line", "end_line", "new_content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: EditArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        debug!(
            path = %resolved.display(),
            start = args.start_line,
            end = args.end_line,
            "edit_file"
        );

        if args.start_line < 1 {
            return Ok(ToolOutput::text(format!(
                "Error editing file: start_line must be at least 1, got {}",
                args.start_line
            )));
        }

        let original = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolOutput::text(format!("Error editing file: {e}"))),
        };

        let updated = splice_lines(
            &original,
            args.start_line as usize,
            args.end_line.max(0) as usize,
            &args.new_content,
        );

        let summary = if updated == original {
            "No changes detected.".to_string()
        } else {
            if let Err(e) = tokio::fs::write(&resolved, &updated).await {
                return Ok(ToolOutput::text(format!("Error applying changes: {e}")));
            }
            let (added, removed) = diff_stats(&original, &updated);
            format!(
                "Changes applied to {}:\n  Lines added: {added}\n  Lines removed: {removed}\n",
                args.path
            )
        };

        Ok(ToolOutput::text(format!(
            "Successfully edited lines {} to {} in {}\n{summary}",
            args.start_line, args.end_line, args.path
        )))
    }
}
