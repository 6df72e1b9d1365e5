//! # Codewright Core
//!
//! Domain types, traits, and error definitions for the Codewright coding
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! Every external collaborator of the agent loop is a trait here:
//! - [`Provider`]: the completion service
//! - [`ToolExecutor`] / [`Tool`]: side-effecting tools
//! - [`MetadataStore`]: durable projects, transcripts and metadata
//!
//! Implementations live in their respective crates, so the loop can be
//! exercised end to end with scripted stand-ins.

pub mod error;
pub mod message;
pub mod metadata;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, DecodeError, ProviderError, Result, StoreError, ToolError};
pub use message::{Role, Turn, TurnContent};
pub use metadata::{MetadataRecord, ProjectMetadata, RecordKind};
pub use provider::{
    CompletionRequest, CompletionResponse, Provider, ResponseBlock, ToolChoice, ToolDefinition,
    Usage,
};
pub use store::{MetadataStore, Project, ProjectData, ProjectId, StoredRecord, StoredTurn};
pub use tool::{Tool, ToolCall, ToolExecutor, ToolOutput, ToolRegistry};
