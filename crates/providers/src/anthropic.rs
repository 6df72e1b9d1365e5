//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - `retry-after` hint surfaced on 429

use async_trait::async_trait;
use codewright_core::error::ProviderError;
use codewright_core::message::Turn;
use codewright_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Seconds to wait when a 429 carries no usable `retry-after` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with a per-request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the request body. `tool_choice` is only sent alongside tools.
    fn to_api_request(request: &CompletionRequest) -> ApiRequest<'_> {
        let has_tools = !request.tools.is_empty();
        ApiRequest {
            model: &request.model,
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: &request.messages,
            tools: &request.tools,
            tool_choice: has_tools.then_some(&request.tool_choice),
            max_tokens: request.max_tokens,
        }
    }

    /// Map a non-success status to a provider error.
    fn error_for_status(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => ProviderError::AuthenticationFailed("Invalid Anthropic API key".into()),
            _ => ProviderError::ApiError {
                status_code: status,
                message: api_error_message(&body).unwrap_or(body),
            },
        }
    }

    /// Convert an Anthropic API response to our CompletionResponse.
    fn to_completion_response(resp: ApiResponse) -> CompletionResponse {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContentBlock::Text { text } => Some(ResponseBlock::Text { text }),
                ApiContentBlock::ToolUse { id, name, input } => {
                    Some(ResponseBlock::ToolUse { id, name, input })
                }
                ApiContentBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            id: resp.id,
            model: resp.model,
            content,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            stop_reason: resp.stop_reason,
        }
    }
}

/// Parse an integral `retry-after` header value.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Pull `error.message` out of an Anthropic error body.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

#[async_trait]
impl codewright_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::AuthenticationFailed(
                "no Anthropic API key configured".into(),
            ));
        }

        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::to_api_request(&request);

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status != 200 {
            let retry_after = parse_retry_after(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(Self::error_for_status(status, retry_after, error_body));
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let completion = Self::to_completion_response(api_resp);
        if let Some(usage) = completion.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = completion.stop_reason.as_deref().unwrap_or(""),
                "Completion received"
            );
        }
        Ok(completion)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        if self.api_key.is_empty() {
            return Ok(false);
        }

        // Minimal request to verify reachability and the key
        let url = format!("{}/v1/messages", self.base_url);
        let body = serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // 401 = bad key, anything else = reachable
        Ok(response.status().as_u16() != 401)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a ToolChoice>,
    max_tokens: u32,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use codewright_core::Provider;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", Duration::from_secs(5)).unwrap()
    }

    fn request(tools: Vec<ToolDefinition>) -> CompletionRequest {
        CompletionRequest {
            model: "claude-3-5-sonnet-20240620".into(),
            system: "You are helpful".into(),
            messages: vec![
                Turn::user("list files"),
                Turn::tool_use("toolu_1", "list_files", serde_json::json!({"path": "."})),
                Turn::tool_result("toolu_1", "a.txt"),
            ],
            tools,
            tool_choice: ToolChoice::Auto,
            max_tokens: 4000,
        }
    }

    #[test]
    fn constructor() {
        let provider = provider();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = provider().with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn request_body_shape() {
        let tools = vec![ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let req = request(tools);
        let body = serde_json::to_value(AnthropicProvider::to_api_request(&req)).unwrap();

        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["tool_choice"], serde_json::json!({"type": "auto"}));
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["messages"][0]["content"], "list files");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn tool_choice_omitted_without_tools() {
        let req = request(Vec::new());
        let body = serde_json::to_value(AnthropicProvider::to_api_request(&req)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            AnthropicProvider::error_for_status(429, Some(12), String::new()),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            AnthropicProvider::error_for_status(429, None, String::new()),
            ProviderError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            }
        ));
        assert!(matches!(
            AnthropicProvider::error_for_status(401, None, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));

        let err = AnthropicProvider::error_for_status(
            529,
            None,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#.into(),
        );
        match err {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn retry_after_header_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));
        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn parse_text_response() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-3-5-sonnet-20240620",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        let completion = AnthropicProvider::to_completion_response(resp);
        assert_eq!(completion.text(), "Hello!");
        assert!(completion.tool_calls().is_empty());
        assert_eq!(completion.usage.unwrap().total(), 15);
        assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn parse_tool_use_response() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-3-5-sonnet-20240620",
                "content": [
                    {"type": "text", "text": "Let me look"},
                    {"type": "tool_use", "id": "toolu_abc", "name": "list_files", "input": {"path": "."}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        let completion = AnthropicProvider::to_completion_response(resp);
        assert_eq!(completion.text(), "Let me look");
        let calls = completion.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_files");
        assert_eq!(calls[0].id, "toolu_abc");
        assert_eq!(calls[0].arguments["path"], ".");
    }

    #[test]
    fn unknown_blocks_are_skipped() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "id": "msg_03",
                "model": "claude-3-5-sonnet-20240620",
                "content": [
                    {"type": "thinking", "thinking": "hmm", "signature": "x"},
                    {"type": "text", "text": "Here's my answer."}
                ]
            }"#,
        )
        .unwrap();

        let completion = AnthropicProvider::to_completion_response(resp);
        assert_eq!(completion.content.len(), 1);
        assert_eq!(completion.text(), "Here's my answer.");
        assert!(completion.usage.is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let provider = AnthropicProvider::new("", Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = provider.complete(request(Vec::new())).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert!(!provider.health_check().await.unwrap());
    }
}
