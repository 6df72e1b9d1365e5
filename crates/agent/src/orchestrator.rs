//! The chat exchange: one user message in, one assistant answer out.
//!
//! An exchange is a single round:
//!
//! 1. **Load** the project snapshot and start a working conversation with
//!    the user's text
//! 2. **Ask** the provider, offering every tool
//! 3. **For each tool call**: execute it, record the call/result pair,
//!    collect its metadata, and ask the provider to follow up
//! 4. **Commit** the working turns (and any new metadata) and return the text
//!
//! Only a rate-limited primary call is retried. Nothing is committed unless
//! the round completes.

use crate::cache::{ConversationCache, ProjectGuard, render_metadata_xml};
use crate::prompt::build_system_prompt;
use codewright_config::{AppConfig, RetryConfig};
use codewright_core::error::{AgentError, ProviderError, Result};
use codewright_core::message::Turn;
use codewright_core::metadata::ProjectMetadata;
use codewright_core::provider::{
    CompletionRequest, CompletionResponse, Provider, ToolChoice, ToolDefinition,
};
use codewright_core::store::ProjectId;
use codewright_core::tool::{ToolExecutor, ToolOutput};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answer text used when neither the model nor a tool produced any.
const EMPTY_ANSWER: &str = "(no response)";

/// Bounded exponential backoff for rate-limited primary calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`
    /// capped at `max_delay`, but never shorter than the provider's hint.
    pub fn delay_for(&self, attempt: u32, retry_after: Duration) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
            .max(retry_after)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }
}

/// Where a round is; logged at debug level.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Loaded,
    AwaitingCompletion,
    DispatchingTools,
    Done,
    Committed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Loaded => "loaded",
            Phase::AwaitingCompletion => "awaiting_completion",
            Phase::DispatchingTools => "dispatching_tools",
            Phase::Done => "done",
            Phase::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Drives chat exchanges against a provider, a tool set and the cache.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    cache: Arc<ConversationCache>,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        cache: Arc<ConversationCache>,
    ) -> Self {
        let defaults = AppConfig::default();
        Self {
            provider,
            tools,
            cache,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            retry: RetryPolicy::default(),
        }
    }

    /// Model, token limit and retry policy taken from the configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        cache: Arc<ConversationCache>,
    ) -> Self {
        Self::new(provider, tools, cache)
            .with_model(config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_retry_policy(RetryPolicy::from(&config.retry))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    /// Run one exchange for `project_id` and return the assistant's answer.
    ///
    /// The project's guard is held throughout, retries included, so
    /// concurrent messages for the same project are answered one at a time.
    pub async fn handle_message(&self, project_id: ProjectId, user_text: &str) -> Result<String> {
        let mut guard = self.cache.lock(project_id).await;
        info!(project_id, provider = self.provider.name(), "Handling chat message");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_round(&mut guard, user_text).await {
                Err(AgentError::Provider(e)) if e.is_rate_limited() => {
                    if attempt >= self.retry.max_attempts {
                        warn!(project_id, attempts = attempt, "Giving up after rate limiting");
                        return Err(AgentError::ExhaustedRetries { attempts: attempt, last: e });
                    }
                    let delay = self.retry.delay_for(attempt, retry_after(&e));
                    warn!(
                        project_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(answer) => {
                    info!(project_id, attempts = attempt, "Chat message answered");
                    return Ok(answer);
                }
                Err(e) => {
                    warn!(project_id, error = %e, "Chat message failed");
                    return Err(e);
                }
            }
        }
    }

    async fn run_round(&self, guard: &mut ProjectGuard, user_text: &str) -> Result<String> {
        let project_id = guard.project_id();
        let snapshot = guard.load().await?;
        let history = snapshot.turns.clone();
        let metadata = snapshot.metadata.clone();
        debug!(project_id, phase = %Phase::Loaded, turns = history.len(), "Round started");

        let tools = self.tools.definitions();
        let mut working = vec![Turn::user(user_text)];

        debug!(project_id, phase = %Phase::AwaitingCompletion, "Requesting completion");
        let primary = self
            .complete(
                &history,
                &working,
                &tools,
                &render_metadata_xml(project_id, &metadata),
            )
            .await?;

        let mut answer = primary.text();
        let calls = primary.tool_calls();
        let mut pending = ProjectMetadata::new();

        for call in calls {
            debug!(project_id, phase = %Phase::DispatchingTools, tool = %call.name, id = %call.id, "Executing tool");
            let output = match self.tools.execute(&call.name, &call.arguments).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(project_id, tool = %call.name, error = %e, "Tool execution failed");
                    ToolOutput::text(format!("Error executing tool: {e}"))
                }
            };

            working.push(Turn::tool_use(&call.id, &call.name, call.arguments));
            working.push(Turn::tool_result(&call.id, output.text));
            if let Some(produced) = output.metadata {
                pending.merge(&produced);
            }

            debug!(project_id, phase = %Phase::AwaitingCompletion, "Requesting follow-up");
            let block = render_metadata_xml(project_id, &metadata.merged_with(&pending));
            match self.complete(&history, &working, &tools, &block).await {
                Ok(follow_up) => {
                    let ignored = follow_up.tool_calls().len();
                    if ignored > 0 {
                        debug!(project_id, ignored, "Follow-up tool calls are not dispatched");
                    }
                    append_paragraph(&mut answer, &follow_up.text());
                }
                Err(e) => {
                    warn!(project_id, error = %e, "Follow-up completion failed");
                    append_paragraph(&mut answer, &format!("Error in tool response: {e}"));
                }
            }
        }

        if answer.is_empty() {
            answer = EMPTY_ANSWER.to_string();
        }
        debug!(project_id, phase = %Phase::Done, chars = answer.len(), "Round finished");

        working.push(Turn::assistant(answer.clone()));
        guard.commit(&working, &pending).await?;
        debug!(
            project_id,
            phase = %Phase::Committed,
            turns = working.len(),
            records = pending.record_count(),
            "Round committed"
        );

        Ok(answer)
    }

    async fn complete(
        &self,
        history: &[Turn],
        working: &[Turn],
        tools: &[ToolDefinition],
        metadata_block: &str,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system: build_system_prompt(metadata_block),
            messages: history.iter().chain(working).cloned().collect(),
            tools: tools.to_vec(),
            tool_choice: ToolChoice::Auto,
            max_tokens: self.max_tokens,
        };
        self.provider.complete(request).await
    }
}

/// Append `text` after a blank line, or as-is when `answer` is still empty.
fn append_paragraph(answer: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !answer.is_empty() {
        answer.push_str("\n\n");
    }
    answer.push_str(text);
}

fn retry_after(error: &ProviderError) -> Duration {
    match error {
        ProviderError::RateLimited { retry_after_secs } => Duration::from_secs(*retry_after_secs),
        _ => Duration::ZERO,
    }
}
