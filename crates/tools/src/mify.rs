//! Mify tools: drive the `mify` scaffolding CLI.
//!
//! Each tool shells out to the configured binary. A failed command (spawn
//! error or non-zero exit) is reported as `Error: ...` text for the model.
//! Service-creating tools additionally read the generated OpenAPI schema
//! and report the service's metadata: the schema location and one handler
//! per route.

use crate::workspace::Workspace;
use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::metadata::{MetadataRecord, ProjectMetadata, RecordKind};
use codewright_core::tool::{Tool, ToolOutput, parse_arguments};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs the mify executable.
#[derive(Debug, Clone)]
pub struct MifyCli {
    binary: String,
}

/// What one mify invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded(String),
    Failed(String),
}

impl CommandOutcome {
    pub fn into_text(self) -> String {
        match self {
            CommandOutcome::Succeeded(text) | CommandOutcome::Failed(text) => text,
        }
    }
}

impl MifyCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub async fn run(&self, args: &[&str]) -> CommandOutcome {
        debug!(binary = %self.binary, ?args, "Running mify");

        let output = match Command::new(&self.binary).args(args).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(binary = %self.binary, error = %e, "Failed to start mify");
                return CommandOutcome::Failed(format!("Error: failed to run {}: {e}", self.binary));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return CommandOutcome::Succeeded(stdout);
        }

        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(binary = %self.binary, ?args, exit_code = code, "mify command failed");
        let mut text = format!(
            "Error: command '{} {}' returned non-zero exit status {code}.",
            self.binary,
            args.join(" ")
        );
        if !stderr.trim().is_empty() {
            text.push('\n');
            text.push_str(stderr.trim());
        }
        CommandOutcome::Failed(text)
    }
}

/// Service names become Python packages, which cannot contain `-`.
fn package_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Read a service's OpenAPI schema and describe it as metadata.
///
/// `path` is the workspace path exactly as the model gave it; it is echoed
/// into the record payloads.
pub async fn service_metadata(
    workspace: &Workspace,
    tool: &str,
    path: &str,
    name: &str,
) -> Result<ProjectMetadata, ToolError> {
    let schema = format!("{path}/schemas/{name}/api/api.yaml");
    let resolved = workspace.resolve_for(tool, &schema)?;

    let failed = |reason: String| ToolError::ExecutionFailed {
        tool_name: tool.to_string(),
        reason,
    };

    let raw = tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|e| failed(format!("File not found: {schema} ({e})")))?;
    let document: serde_yaml::Value = serde_yaml::from_str(&raw)
        .map_err(|e| failed(format!("Error parsing YAML file: {e}")))?;
    let document = document
        .as_mapping()
        .ok_or_else(|| failed(format!("{schema} is not a YAML mapping")))?;

    let mut metadata = ProjectMetadata::new();
    metadata.push(name, MetadataRecord::new(RecordKind::OpenapiSchema, &schema));

    if let Some(paths) = document.get("paths").and_then(|p| p.as_mapping()) {
        for route in paths.keys().filter_map(|k| k.as_str()) {
            metadata.push(
                name,
                MetadataRecord::new(
                    RecordKind::ApiHandler,
                    format!("{path}/py-services/{name}/handlers{route}/service.py:{route}"),
                ),
            );
        }
    }

    Ok(metadata)
}

fn path_property() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "The path of the mify workspace"
    })
}

fn name_property() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "The name of the service"
    })
}

/// `mify init` a new workspace.
pub struct CreateWorkspaceTool {
    workspace: Workspace,
    cli: MifyCli,
}

impl CreateWorkspaceTool {
    pub fn new(workspace: Workspace, cli: MifyCli) -> Self {
        Self { workspace, cli }
    }
}

#[derive(Deserialize)]
struct WorkspaceArgs {
    path: String,
}

#[async_trait]
impl Tool for CreateWorkspaceTool {
    fn name(&self) -> &str {
        "create_workspace"
    }

    fn description(&self) -> &str {
        "Create mify workspace"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": path_property() },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: WorkspaceArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        let target = resolved.to_string_lossy();

        let outcome = self.cli.run(&["init", "-p", &target]).await;
        Ok(ToolOutput::text(outcome.into_text()))
    }
}

/// `mify add service`, then report the new service's metadata.
pub struct CreateServiceTool {
    workspace: Workspace,
    cli: MifyCli,
}

impl CreateServiceTool {
    pub fn new(workspace: Workspace, cli: MifyCli) -> Self {
        Self { workspace, cli }
    }
}

#[derive(Deserialize)]
struct CreateServiceArgs {
    path: String,
    name: String,
    language: String,
}

#[async_trait]
impl Tool for CreateServiceTool {
    fn name(&self) -> &str {
        "create_service"
    }

    fn description(&self) -> &str {
        "Create mify service"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": path_property(),
                "name": name_property(),
                "language": {
                    "type": "string",
                    "description": "The language of the service"
                }
            },
            "required": ["path", "name", "language"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: CreateServiceArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        let target = resolved.to_string_lossy();
        let name = package_name(&args.name);

        let outcome = self
            .cli
            .run(&[
                "add",
                "service",
                &name,
                "--language",
                &args.language,
                "-p",
                &target,
            ])
            .await;

        match outcome {
            CommandOutcome::Succeeded(text) => {
                let metadata =
                    service_metadata(&self.workspace, self.name(), &args.path, &name).await?;
                Ok(ToolOutput::with_metadata(text, metadata))
            }
            CommandOutcome::Failed(text) => Ok(ToolOutput::text(text)),
        }
    }
}

/// `mify add client`: let one service call another.
pub struct AddClientTool {
    workspace: Workspace,
    cli: MifyCli,
}

impl AddClientTool {
    pub fn new(workspace: Workspace, cli: MifyCli) -> Self {
        Self { workspace, cli }
    }
}

#[derive(Deserialize)]
struct AddClientArgs {
    path: String,
    name: String,
    client_name: String,
}

#[async_trait]
impl Tool for AddClientTool {
    fn name(&self) -> &str {
        "add_client"
    }

    fn description(&self) -> &str {
        "Add client to service"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": path_property(),
                "name": name_property(),
                "client_name": {
                    "type": "string",
                    "description": "Name of the client service"
                }
            },
            "required": ["path", "name", "client_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: AddClientArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        let target = resolved.to_string_lossy();
        let name = package_name(&args.name);

        let outcome = self
            .cli
            .run(&["add", "client", &name, "--to", &args.client_name, "-p", &target])
            .await;
        Ok(ToolOutput::text(outcome.into_text()))
    }
}

/// `mify generate`, then re-report the service's metadata.
pub struct MifyGenerateTool {
    workspace: Workspace,
    cli: MifyCli,
}

impl MifyGenerateTool {
    pub fn new(workspace: Workspace, cli: MifyCli) -> Self {
        Self { workspace, cli }
    }
}

#[derive(Deserialize)]
struct GenerateArgs {
    path: String,
    name: String,
}

#[async_trait]
impl Tool for MifyGenerateTool {
    fn name(&self) -> &str {
        "mify_generate"
    }

    fn description(&self) -> &str {
        "Regenerate mify boilerplate"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": path_property(),
                "name": name_property()
            },
            "required": ["path", "name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: GenerateArgs = parse_arguments(self.name(), arguments)?;
        let resolved = self.workspace.resolve_for(self.name(), &args.path)?;
        let target = resolved.to_string_lossy();
        let name = package_name(&args.name);

        match self.cli.run(&["generate", "-p", &target]).await {
            CommandOutcome::Succeeded(text) => {
                let metadata =
                    service_metadata(&self.workspace, self.name(), &args.path, &name).await?;
                Ok(ToolOutput::with_metadata(text, metadata))
            }
            CommandOutcome::Failed(text) => Ok(ToolOutput::text(text)),
        }
    }
}
