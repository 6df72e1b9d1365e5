//! Scripted stand-ins for driving the orchestrator without a network.

use async_trait::async_trait;
use codewright_core::error::ProviderError;
use codewright_core::provider::{CompletionRequest, CompletionResponse, Provider, ResponseBlock};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A provider that replays queued responses in order and records every
/// request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = Result<CompletionResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }
}

/// A response holding the given blocks.
pub fn response(content: Vec<ResponseBlock>) -> CompletionResponse {
    CompletionResponse {
        id: "msg_scripted".into(),
        model: "scripted".into(),
        content,
        usage: None,
        stop_reason: Some("end_turn".into()),
    }
}

/// A text-only response.
pub fn text(text: &str) -> CompletionResponse {
    response(vec![ResponseBlock::Text { text: text.into() }])
}

/// A response asking for one tool call.
pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> CompletionResponse {
    CompletionResponse {
        stop_reason: Some("tool_use".into()),
        ..response(vec![ResponseBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }])
    }
}

pub fn rate_limited(retry_after_secs: u64) -> ProviderError {
    ProviderError::RateLimited { retry_after_secs }
}
