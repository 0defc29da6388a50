//! Anthropic-backed client.
//!
//! Adapts the provider-neutral request to the Anthropic messages API:
//! system messages are lifted to the top-level `system` field, image parts
//! become base64 source blocks, and structured output is requested by
//! forcing a tool whose input schema is the response model's schema. The
//! response is normalized back into the chat-completion shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use pagepilot_types::{AnthropicClientOptions, AvailableModel, ModelProvider};

use crate::cache::LlmCache;
use crate::client::{self, cached_value, error_for_status, http_client, wrap_cached, LlmClient};
use crate::error::{LlmError, Result};
use crate::retry::{self, RetryConfig};
use crate::types::{
    ChatCompletionOptions, ChatMessage, ChatResponse, Choice, CompletionResult, ContentPart,
    FunctionCall, MessageContent, ResponseMessage, ToolCall, Usage,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// The messages API requires max_tokens on every request.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Name of the forced tool used to obtain schema-constrained output.
const EXTRACTION_TOOL: &str = "print_extracted_data";

/// Client for the Anthropic messages API.
#[derive(Debug)]
pub struct AnthropicClient {
    model: AvailableModel,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache: Option<Arc<LlmCache>>,
    retry: RetryConfig,
}

impl AnthropicClient {
    /// Create a new client.
    ///
    /// The API key may be omitted here and resolved from the
    /// `ANTHROPIC_API_KEY` environment variable at request time.
    pub fn new(
        model: AvailableModel,
        options: AnthropicClientOptions,
        cache: Option<Arc<LlmCache>>,
    ) -> Result<Self> {
        Ok(Self {
            model,
            http: http_client(options.timeout_secs)?,
            base_url: options
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: options.api_key,
            cache,
            retry: RetryConfig::with_max_retries(options.max_retries),
        })
    }

    /// Replace the retry configuration, overriding the default backoff.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/messages")
    }

    fn resolve_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::NotConfigured("set ANTHROPIC_API_KEY env var".into()))
    }

    fn request_body(
        &self,
        options: &ChatCompletionOptions,
        messages: &[ChatMessage],
    ) -> serde_json::Value {
        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n");

        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(wire_message)
            .collect();

        let mut body = serde_json::json!({
            "model": self.model.as_str(),
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": wire_messages,
        });
        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        let mut tools: Vec<serde_json::Value> = options
            .tools
            .iter()
            .flatten()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();

        if let Some(ref response_model) = options.response_model {
            tools.push(serde_json::json!({
                "name": EXTRACTION_TOOL,
                "description": format!("Record the extracted data as '{}'", response_model.name),
                "input_schema": response_model.schema,
            }));
            body["tool_choice"] = serde_json::json!({"type": "tool", "name": EXTRACTION_TOOL});
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools);
        }

        body
    }

    async fn attempt(
        &self,
        options: &ChatCompletionOptions,
        body: &serde_json::Value,
    ) -> Result<CompletionResult> {
        let api_key = self.resolve_api_key()?;

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let message: AnthropicMessage = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if let Some(ref response_model) = options.response_model {
            let input = message
                .content
                .iter()
                .find_map(|block| match block {
                    AnthropicBlock::ToolUse { input, name, .. } if name == EXTRACTION_TOOL => {
                        Some(input.clone())
                    }
                    _ => None,
                })
                .ok_or_else(|| {
                    LlmError::InvalidResponseSchema(
                        "response contained no extraction tool call".into(),
                    )
                })?;
            let value = client::validate_structured_value(response_model, input)?;
            return Ok(CompletionResult::Structured(value));
        }

        Ok(CompletionResult::Chat(normalize(message)))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Anthropic
    }

    fn model(&self) -> AvailableModel {
        self.model
    }

    async fn create_chat_completion(
        &self,
        options: &ChatCompletionOptions,
    ) -> Result<CompletionResult> {
        let messages = options.transmission_messages();
        let cache_opts = client::cache_options(self.model, options);

        if let Some(ref cache) = self.cache {
            if let Some(value) = cache.get::<serde_json::Value>(&cache_opts, &options.request_id) {
                debug!(
                    provider = "anthropic",
                    request_id = %options.request_id,
                    "returning cached response"
                );
                return Ok(wrap_cached(options, value));
            }
            debug!(
                provider = "anthropic",
                request_id = %options.request_id,
                "cache miss"
            );
        }

        debug!(
            provider = "anthropic",
            model = %self.model,
            messages = messages.len(),
            request_id = %options.request_id,
            "sending chat completion request"
        );

        let body = self.request_body(options, &messages);
        let result =
            retry::run(&self.retry, "anthropic", |_| self.attempt(options, &body)).await?;

        if let Some(ref cache) = self.cache {
            let _ = cache.set(&cache_opts, &cached_value(&result), &options.request_id);
        }

        Ok(result)
    }
}

/// Translate one provider-neutral message to the Anthropic wire shape.
fn wire_message(message: &ChatMessage) -> serde_json::Value {
    let content = match &message.content {
        MessageContent::Text(text) => serde_json::json!(text),
        MessageContent::Parts(parts) => {
            let blocks: Vec<serde_json::Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::ImageUrl { image_url } => {
                        let (media_type, data) = split_data_url(&image_url.url);
                        serde_json::json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": media_type,
                                "data": data,
                            }
                        })
                    }
                })
                .collect();
            serde_json::Value::Array(blocks)
        }
    };
    serde_json::json!({"role": message.role, "content": content})
}

/// Split a `data:<media_type>;base64,<data>` URL into its pieces.
/// Non-data URLs fall back to jpeg with the raw string as data.
fn split_data_url(url: &str) -> (String, String) {
    url.strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(media_type, data)| (media_type.to_string(), data.to_string()))
        .unwrap_or_else(|| ("image/jpeg".to_string(), url.to_string()))
}

#[derive(Debug, Deserialize)]
struct AnthropicMessage {
    id: String,
    model: String,
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: i32,
    output_tokens: i32,
}

/// Normalize an Anthropic message into the chat-completion shape.
fn normalize(message: AnthropicMessage) -> ChatResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &message.content {
        match block {
            AnthropicBlock::Text { text: t } => text.push_str(t),
            AnthropicBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
        }
    }

    let finish_reason = message.stop_reason.map(|reason| match reason.as_str() {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        "max_tokens" => "length".to_string(),
        _ => reason,
    });

    ChatResponse {
        id: message.id,
        model: message.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".into(),
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
            finish_reason,
        }],
        usage: message.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }),
    }
}
