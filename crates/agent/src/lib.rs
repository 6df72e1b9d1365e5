//! The Codewright agent: turns a user message into an assistant answer.
//!
//! Each exchange runs as a single round against the provider:
//!
//! 1. **Load** the project's transcript and metadata (cached per project)
//! 2. **Ask** the model, offering the tool declarations
//! 3. **Act** on each requested tool call, then let the model follow up
//! 4. **Commit** the new turns and metadata, and answer
//!
//! Requests for the same project are serialized; different projects run
//! concurrently.

pub mod cache;
pub mod orchestrator;
pub mod prompt;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{ConversationCache, ProjectGuard, Snapshot, render_metadata_xml};
pub use orchestrator::{Orchestrator, RetryPolicy};
pub use prompt::build_system_prompt;
