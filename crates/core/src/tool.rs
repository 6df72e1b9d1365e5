//! Tool trait: the abstraction over the assistant's side effects.
//!
//! Tools give the model the ability to act on a project: create and edit
//! files, and drive the `mify` code generator. Each tool declares a JSON
//! schema; the [`ToolRegistry`] validates arguments against that schema
//! before dispatching, so the model-facing declaration and the handler can
//! never drift apart.

use crate::error::ToolError;
use crate::metadata::ProjectMetadata;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// What a tool hands back: text for the model, plus any metadata it discovered.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub metadata: Option<ProjectMetadata>,
}

impl ToolOutput {
    /// A result with no metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    /// A result that also reports new metadata.
    pub fn with_metadata(text: impl Into<String>, metadata: ProjectMetadata) -> Self {
        Self {
            text: text.into(),
            metadata: Some(metadata),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a declaration for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Anything that can run tool calls on behalf of the orchestrator.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Declarations to send with every completion request.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one call. Unknown names are not an error: they produce a textual
    /// result the model can react to.
    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ToolError>;
}

/// Deserialize validated arguments into a tool's typed parameter struct.
pub fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{tool}: {e}")))
}

/// Check `arguments` against a tool's declared object schema: required
/// parameters must be present and every declared parameter must have the
/// declared JSON type.
pub fn validate_arguments(
    tool: &str,
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), ToolError> {
    let args = arguments.as_object().ok_or_else(|| {
        ToolError::InvalidArguments(format!("arguments for tool {tool} must be an object"))
    })?;

    if let Some(required) = schema["required"].as_array() {
        for param in required.iter().filter_map(|p| p.as_str()) {
            if args.get(param).is_none_or(|v| v.is_null()) {
                return Err(ToolError::InvalidArguments(format!(
                    "Missing required parameter '{param}' for tool {tool}"
                )));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (param, value) in args {
            let Some(expected) = properties.get(param).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches && !value.is_null() {
                return Err(ToolError::InvalidArguments(format!(
                    "Parameter '{param}' for tool {tool} must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

/// A table of available tools, kept in registration order.
///
/// The orchestrator uses this to:
/// 1. Get tool declarations to send to the model
/// 2. Look up, validate and execute tools the model requests
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = %name, "Model requested an unknown tool");
            return Ok(ToolOutput::text(format!("Unknown tool: {name}")));
        };
        validate_arguments(name, &tool.parameters_schema(), arguments)?;
        tool.execute(arguments.clone()).await
    }
}
