//! Generic HTTP-backend client.
//!
//! Talks to a self-hosted relay that speaks the chat-completion protocol at
//! `POST {backend_url}/chat/completions`. Any supported model name can be
//! redirected through this client via the router's override rule, which
//! makes it the path for running the layer against proxies and local model
//! servers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use pagepilot_types::{AvailableModel, BackendClientOptions, ModelProvider};

use crate::cache::LlmCache;
use crate::client::{
    self, cached_value, error_for_status, http_client, openai_response_format, openai_tools,
    wrap_cached, LlmClient,
};
use crate::error::{LlmError, Result};
use crate::retry::{self, RetryConfig};
use crate::types::{ChatCompletionOptions, ChatMessage, ChatResponse, CompletionResult};

/// Client for a self-hosted chat-completion relay.
pub struct BackendClient {
    model: AvailableModel,
    http: reqwest::Client,
    backend_url: String,
    cache: Option<Arc<LlmCache>>,
    retry: RetryConfig,
}

impl BackendClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] when `backend_url` is missing;
    /// no network call is attempted.
    pub fn new(
        model: AvailableModel,
        options: BackendClientOptions,
        cache: Option<Arc<LlmCache>>,
    ) -> Result<Self> {
        let backend_url = options.backend_url.clone().ok_or_else(|| {
            LlmError::NotConfigured("backend_url must be provided for the backend client".into())
        })?;
        Ok(Self {
            model,
            http: http_client(options.timeout_secs)?,
            backend_url,
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
        let base = self.backend_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn request_body(
        &self,
        options: &ChatCompletionOptions,
        messages: &[ChatMessage],
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model.as_str(),
            "messages": messages,
            "stream": false,
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

    async fn attempt(
        &self,
        options: &ChatCompletionOptions,
        body: &serde_json::Value,
    ) -> Result<CompletionResult> {
        let response = self
            .http
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
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
impl LlmClient for BackendClient {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Backend
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
                    provider = "backend",
                    request_id = %options.request_id,
                    "returning cached response"
                );
                return Ok(wrap_cached(options, value));
            }
            debug!(
                provider = "backend",
                request_id = %options.request_id,
                "cache miss"
            );
        }

        debug!(
            provider = "backend",
            model = %self.model,
            messages = messages.len(),
            request_id = %options.request_id,
            "sending chat completion request via backend relay"
        );

        let body = self.request_body(options, &messages);
        let result = retry::run(&self.retry, "backend", |_| self.attempt(options, &body)).await?;

        if let Some(ref cache) = self.cache {
            let _ = cache.set(&cache_opts, &cached_value(&result), &options.request_id);
        }

        Ok(result)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("model", &self.model)
            .field("backend_url", &self.backend_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_backend_url_fails_construction() {
        let err = BackendClient::new(
            AvailableModel::Gpt4o,
            BackendClientOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert!(err.to_string().contains("backend_url"));
    }

    #[test]
    fn completions_url_from_backend_url() {
        let client = BackendClient::new(
            AvailableModel::Gpt4o,
            BackendClientOptions {
                backend_url: Some("https://relay.example.com/".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(
            client.completions_url(),
            "https://relay.example.com/chat/completions"
        );
    }

    #[test]
    fn request_body_disables_streaming() {
        let client = BackendClient::new(
            AvailableModel::Gpt4oMini,
            BackendClientOptions {
                backend_url: Some("https://relay.example.com".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let options = ChatCompletionOptions::new(vec![ChatMessage::user("hi")], "req-1");
        let body = client.request_body(&options, &options.transmission_messages());
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "gpt-4o-mini");
    }
}
