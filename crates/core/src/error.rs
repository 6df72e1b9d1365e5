//! Error types for the Codewright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] is what the
//! orchestrator surfaces to its callers.

use thiserror::Error;

/// The top-level error returned by a chat exchange.
#[derive(Debug, Error)]
pub enum AgentError {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider still rate limited after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: ProviderError },

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Stored data that no longer parses ---
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether this failure is the provider asking us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// A stored turn payload that could not be decoded back into a [`crate::Turn`].
#[derive(Debug, Error)]
#[error("stored turn #{index} of project {project_id} is malformed: {reason}")]
pub struct DecodeError {
    pub project_id: i64,
    pub index: usize,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = AgentError::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn rate_limit_detection() {
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_rate_limited());
        assert!(!ProviderError::Network("reset".into()).is_rate_limited());
    }

    #[test]
    fn exhausted_retries_mentions_attempts() {
        let err = AgentError::ExhaustedRetries {
            attempts: 4,
            last: ProviderError::RateLimited { retry_after_secs: 5 },
        };
        assert!(err.to_string().contains("4 attempts"));
    }

    #[test]
    fn decode_error_names_the_turn() {
        let err = DecodeError {
            project_id: 3,
            index: 12,
            reason: "expected value".into(),
        };
        assert!(err.to_string().contains("#12"));
        assert!(err.to_string().contains("project 3"));
    }
}
