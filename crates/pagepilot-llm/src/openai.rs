//! OpenAI-backed client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use pagepilot_types::{AvailableModel, ModelProvider, OpenAiClientOptions};

use crate::cache::LlmCache;
use crate::client::{
    self, cached_value, error_for_status, http_client, openai_response_format, openai_tools,
    wrap_cached, LlmClient,
};
use crate::error::{LlmError, Result};
use crate::retry::{self, RetryConfig};
use crate::types::{ChatCompletionOptions, ChatMessage, ChatResponse, CompletionResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions API.
pub struct OpenAiClient {
    model: AvailableModel,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    organization: Option<String>,
    cache: Option<Arc<LlmCache>>,
    retry: RetryConfig,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// The API key may be omitted here and resolved from the
    /// `OPENAI_API_KEY` environment variable at request time.
    pub fn new(
        model: AvailableModel,
        options: OpenAiClientOptions,
        cache: Option<Arc<LlmCache>>,
    ) -> Result<Self> {
        Ok(Self {
            model,
            http: http_client(options.timeout_secs)?,
            base_url: options
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: options.api_key,
            organization: options.organization,
            cache,
            retry: RetryConfig::with_max_retries(options.max_retries),
        })
    }

    /// Replace the retry configuration, overriding the default backoff.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Resolve the API key: explicit key > environment variable.
    fn resolve_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::NotConfigured("set OPENAI_API_KEY env var".into()))
    }

    fn request_body(
        &self,
        options: &ChatCompletionOptions,
        messages: &[ChatMessage],
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model.as_str(),
            "messages": messages,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(frequency_penalty) = options.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(frequency_penalty);
        }
        if let Some(presence_penalty) = options.presence_penalty {
            body["presence_penalty"] = serde_json::json!(presence_penalty);
        }
        if let Some(ref response_model) = options.response_model {
            body["response_format"] = openai_response_format(response_model);
        }
        if let Some(ref tools) = options.tools {
            body["tools"] = serde_json::Value::Array(openai_tools(tools));
        }
        body
    }

    /// One wire attempt: send, map status, parse, and in structured mode
    /// extract and validate the payload.
    async fn attempt(
        &self,
        options: &ChatCompletionOptions,
        body: &serde_json::Value,
    ) -> Result<CompletionResult> {
        let api_key = self.resolve_api_key()?;

        let mut request = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");
        if let Some(ref organization) = self.organization {
            request = request.header("OpenAI-Organization", organization);
        }

        let response = request.json(body).send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if let Some(ref response_model) = options.response_model {
            let payload = chat.first_content().ok_or_else(|| {
                LlmError::InvalidResponseSchema("response contained no text payload".into())
            })?;
            let value = client::parse_structured_payload(response_model, payload)?;
            return Ok(CompletionResult::Structured(value));
        }

        Ok(CompletionResult::Chat(chat))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> ModelProvider {
        ModelProvider::OpenAi
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
                    provider = "openai",
                    request_id = %options.request_id,
                    "returning cached response"
                );
                return Ok(wrap_cached(options, value));
            }
            debug!(
                provider = "openai",
                request_id = %options.request_id,
                "cache miss"
            );
        }

        debug!(
            provider = "openai",
            model = %self.model,
            messages = messages.len(),
            request_id = %options.request_id,
            "sending chat completion request"
        );

        let body = self.request_body(options, &messages);
        let result = retry::run(&self.retry, "openai", |_| self.attempt(options, &body)).await?;

        if let Some(ref cache) = self.cache {
            let _ = cache.set(&cache_opts, &cached_value(&result), &options.request_id);
        }

        Ok(result)
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseModel;

    fn client_with(options: OpenAiClientOptions) -> OpenAiClient {
        OpenAiClient::new(AvailableModel::Gpt4o, options, None).unwrap()
    }

    #[test]
    fn default_base_url() {
        let client = client_with(OpenAiClientOptions::default());
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let client = client_with(OpenAiClientOptions {
            base_url: Some("https://example.com/v1/".into()),
            ..Default::default()
        });
        assert_eq!(client.completions_url(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn explicit_api_key_wins() {
        let client = client_with(OpenAiClientOptions {
            api_key: Some("sk-explicit".into()),
            ..Default::default()
        });
        assert_eq!(client.resolve_api_key().unwrap(), "sk-explicit");
    }

    #[test]
    fn request_body_includes_sampling_params() {
        let client = client_with(OpenAiClientOptions::default());
        let mut options =
            ChatCompletionOptions::new(vec![ChatMessage::user("hi")], "req-1");
        options.temperature = Some(0.3);
        options.top_p = Some(0.9);
        let body = client.request_body(&options, &options.transmission_messages());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["top_p"], 0.9);
        assert!(body.get("response_format").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn request_body_with_response_model() {
        let client = client_with(OpenAiClientOptions::default());
        let mut options = ChatCompletionOptions::new(vec![ChatMessage::user("hi")], "req-1");
        options.response_model = Some(ResponseModel {
            name: "extraction".into(),
            schema: serde_json::json!({"type": "object"}),
        });
        let body = client.request_body(&options, &options.transmission_messages());
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "extraction");
    }

    #[test]
    fn debug_hides_api_key() {
        let client = client_with(OpenAiClientOptions {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        });
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn cached_chat_value_rehydrates_as_chat() {
        let options = ChatCompletionOptions::new(vec![ChatMessage::user("hi")], "r");
        let value = serde_json::json!({
            "id": "c1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}],
            "model": "gpt-4o"
        });
        let result = wrap_cached(&options, value);
        assert!(result.as_chat().is_some());
    }

    #[test]
    fn cached_structured_value_rehydrates_as_structured() {
        let mut options = ChatCompletionOptions::new(vec![ChatMessage::user("hi")], "r");
        options.response_model = Some(ResponseModel {
            name: "x".into(),
            schema: serde_json::json!({"type": "object"}),
        });
        let result = wrap_cached(&options, serde_json::json!({"selector": "#a"}));
        assert!(matches!(result, CompletionResult::Structured(_)));
    }
}
