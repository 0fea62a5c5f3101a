//! Generic OpenAI-compatible chat-completion client.
//!
//! One wire client covers every configured provider:
//! - OpenAI (`https://api.openai.com/v1`)
//! - OpenRouter (`https://openrouter.ai/api/v1`)
//! - DeepSeek (`https://api.deepseek.com/v1`)
//! - Ollama (`http://localhost:11434/v1`, no API key)
//!
//! The client performs exactly one attempt per call and classifies every
//! failure into the [`ProviderError`] taxonomy; retry policy lives in the
//! [`ReliableProvider`](super::reliable::ReliableProvider) wrapper, never
//! here.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::ai::provider::{LLMProvider, ProviderError, Result, StreamResponse};
use crate::ai::types::{
    CompletionRequest, CompletionResponse, Message as AppMessage, MessageRole, StreamChunk,
    TokenUsage, ToolCall,
};
use crate::errors::{sanitize_key, AgentError, AgentResult};

/// Default timeout for HTTP requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDef {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunctionDef,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ChatCompletionResponse {
    id: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    model: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
    index: u32,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
    index: u32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Delta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ApiStreamResponse {
    id: String,
    choices: Vec<StreamChoice>,
    model: String,
}

// ─── Failure classification ──────────────────────────────────────────────────

/// Map a reqwest failure onto the taxonomy.  Timeouts and connection
/// failures are transient; anything else at this layer means the exchange
/// itself broke down.
fn classify_transport(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        ProviderError::Transport(e.to_string())
    } else if e.is_decode() {
        ProviderError::Malformed(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

/// Map a non-success HTTP status onto the taxonomy.  5xx is worth a retry;
/// 429 carries its own variant so the policy can back off harder; all other
/// client errors are permanent rejections.
fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(format!("HTTP 429: {body}"))
    } else if status.is_server_error() {
        ProviderError::Transport(format!("HTTP {status}: {body}"))
    } else {
        ProviderError::Rejected(format!("HTTP {status}: {body}"))
    }
}

// ─── OpenAICompatibleConfig ──────────────────────────────────────────────────

/// Configuration for an OpenAI-compatible provider endpoint.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    /// API key for authentication (empty for local providers like Ollama).
    pub api_key: String,
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// Default model to use.
    pub default_model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Additional HTTP headers.
    pub extra_headers: HashMap<String, String>,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            default_model: String::new(),
            timeout: DEFAULT_TIMEOUT,
            extra_headers: HashMap::new(),
        }
    }
}

impl OpenAICompatibleConfig {
    /// Create a new configuration with API key, base URL, and default model.
    pub fn with_model(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: model.into(),
            ..Default::default()
        }
    }

    /// Set the default model.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an extra HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Create configuration for OpenAI.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, "https://api.openai.com/v1", "gpt-4o-mini")
    }

    /// Create configuration for OpenRouter.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::with_model(
            api_key,
            "https://openrouter.ai/api/v1",
            "anthropic/claude-sonnet-4.5",
        )
    }

    /// Create configuration for DeepSeek.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, "https://api.deepseek.com/v1", "deepseek-chat")
    }

    /// Create configuration for Ollama (local, no API key).
    pub fn ollama() -> Self {
        Self::with_model("", "http://localhost:11434/v1", "llama3")
    }
}

// ─── OpenAICompatibleProvider ────────────────────────────────────────────────

/// Provider speaking the OpenAI chat-completion protocol.
pub struct OpenAICompatibleProvider {
    client: Client,
    config: OpenAICompatibleConfig,
    provider_name: String,
}

impl OpenAICompatibleProvider {
    pub fn new(
        config: OpenAICompatibleConfig,
        provider_name: impl Into<String>,
    ) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            provider_name: provider_name.into(),
        })
    }

    fn convert_message(msg: &AppMessage) -> ApiMessage {
        match msg.role {
            MessageRole::System => ApiMessage {
                role: "system".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            MessageRole::User => ApiMessage {
                role: "user".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            MessageRole::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|c| ApiToolCall {
                                id: c.id.clone(),
                                kind: "function".to_string(),
                                function: ApiFunctionCall {
                                    name: c.name.clone(),
                                    arguments: c.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                };
                ApiMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                    tool_calls,
                    tool_call_id: None,
                }
            }
            MessageRole::Tool => ApiMessage {
                role: "tool".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: msg.tool_results.first().map(|r| r.call_id.clone()),
            },
        }
    }

    fn convert_tool_call(call: &ApiToolCall) -> ToolCall {
        // `arguments` arrives as a JSON string; tolerate object form too.
        let arguments = serde_json::from_str::<Value>(&call.function.arguments)
            .unwrap_or(Value::Object(Default::default()));
        ToolCall::new(call.id.clone(), call.function.name.clone(), arguments)
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| ApiToolDef {
                    kind: "function",
                    function: ApiFunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: request.stream,
        }
    }

    /// Single classified POST to `/chat/completions`.  All headers —
    /// content type, bearer auth when a key is configured, and any
    /// provider-specific extras — are folded in here.
    async fn post_chat(&self, api_request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(api_request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }
        for (key, value) in &self.config.extra_headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body);
        log::warn!(
            "[llm] {} {url} failed ({}, transient={})",
            self.provider_name,
            status,
            err.is_transient()
        );
        Err(err)
    }
}

/// Interpret one SSE frame from the completion stream.  Returns `None` for
/// frames carrying nothing of interest (e.g. empty choice lists).
fn chunk_from_sse(data: &str) -> Option<Result<StreamChunk>> {
    if data == "[DONE]" {
        return Some(Ok(StreamChunk {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".to_string()),
        }));
    }

    let parsed: ApiStreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Some(Err(ProviderError::Malformed(format!(
                "stream chunk: {e}"
            ))))
        }
    };
    let choice = parsed.choices.first()?;
    Some(Ok(StreamChunk {
        delta: choice.delta.content.clone().unwrap_or_default(),
        is_final: choice.finish_reason.is_some(),
        finish_reason: choice.finish_reason.clone(),
    }))
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_request = self.build_request(&request);

        log::debug!(
            "[llm] {} complete model={} key={}",
            self.provider_name,
            api_request.model,
            sanitize_key(&self.config.api_key)
        );

        let response = self.post_chat(&api_request).await?;
        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let choice = api_response
            .choices
            .first()
            .ok_or_else(|| ProviderError::Malformed("no choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(Self::convert_tool_call)
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            tool_calls,
            model: api_response.model,
            usage: api_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason.clone(),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamResponse> {
        let mut api_request = self.build_request(&request);
        api_request.stream = Some(true);

        let response = self.post_chat(&api_request).await?;
        let events = response.bytes_stream().eventsource();

        let chunks = events.filter_map(|event| async move {
            match event {
                Ok(event) => chunk_from_sse(&event.data),
                Err(e) => Some(Err(ProviderError::Transport(e.to_string()))),
            }
        });

        Ok(Box::pin(chunks))
    }

    fn context_limit(&self) -> usize {
        128_000
    }

    fn model_id(&self) -> &str {
        &self.config.default_model
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use serde_json::json;

    #[test]
    fn config_openai() {
        let config = OpenAICompatibleConfig::openai("test-key");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn config_deepseek() {
        let config = OpenAICompatibleConfig::deepseek("test-key");
        assert_eq!(config.base_url, "https://api.deepseek.com/v1");
        assert_eq!(config.default_model, "deepseek-chat");
    }

    #[test]
    fn config_ollama_needs_no_key() {
        let config = OpenAICompatibleConfig::ollama();
        assert!(config.api_key.is_empty());
        assert!(OpenAICompatibleProvider::new(config, "ollama").is_ok());
    }

    #[test]
    fn status_classification_drives_retry_policy() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "upstream").is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "bad key").is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, "no model").is_transient());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "oops"),
            ProviderError::Rejected(_)
        ));
    }

    #[test]
    fn assistant_tool_calls_serialized_as_function_calls() {
        let msg = AppMessage::assistant_with_calls(
            "",
            vec![ToolCall::new("c1", "file_read", json!({"path": "/a"}))],
        );
        let api = OpenAICompatibleProvider::convert_message(&msg);
        assert_eq!(api.role, "assistant");
        let calls = api.tool_calls.unwrap();
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].function.name, "file_read");
        // Arguments are JSON-encoded as a string on the wire.
        let decoded: Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(decoded["path"], "/a");
    }

    #[test]
    fn tool_observation_carries_call_id() {
        let msg = AppMessage::tool_observation(ToolResult::ok("c7", "done"));
        let api = OpenAICompatibleProvider::convert_message(&msg);
        assert_eq!(api.role, "tool");
        assert_eq!(api.tool_call_id.as_deref(), Some("c7"));
    }

    #[test]
    fn wire_tool_call_with_object_arguments_tolerated() {
        let api_call = ApiToolCall {
            id: "x".into(),
            kind: "function".into(),
            function: ApiFunctionCall {
                name: "bash".into(),
                arguments: "not-json".into(),
            },
        };
        let call = OpenAICompatibleProvider::convert_tool_call(&api_call);
        assert!(call.arguments.is_object());
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn sse_done_frame_is_final() {
        let chunk = chunk_from_sse("[DONE]").unwrap().unwrap();
        assert!(chunk.is_final);
        assert!(chunk.delta.is_empty());
    }

    #[test]
    fn sse_content_frame_yields_delta() {
        let data = r#"{"id":"1","model":"m","choices":[{"index":0,"finish_reason":null,"delta":{"content":"hel"}}]}"#;
        let chunk = chunk_from_sse(data).unwrap().unwrap();
        assert_eq!(chunk.delta, "hel");
        assert!(!chunk.is_final);
    }

    #[test]
    fn sse_empty_choices_frame_is_skipped() {
        let data = r#"{"id":"1","model":"m","choices":[]}"#;
        assert!(chunk_from_sse(data).is_none());
    }

    #[test]
    fn sse_garbage_frame_is_malformed() {
        let result = chunk_from_sse("not json").unwrap();
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }
}
