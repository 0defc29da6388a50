//! Remote agent-proxy client.
//!
//! Delegates fully to a hosted agent: the options payload is forwarded
//! nearly verbatim to `POST {backend_url}/browser` with bearer-token and
//! fingerprint headers. The remote side is trusted to return already
//! validated output, so this client performs no local schema validation
//! and no caching; transport failures still get the bounded retry loop,
//! while non-success statuses are surfaced immediately as upstream errors.

use async_trait::async_trait;
use tracing::{debug, warn};

use pagepilot_types::{AvailableModel, ModelProvider, RelayClientOptions};

use crate::client::{http_client, LlmClient};
use crate::error::{LlmError, Result};
use crate::retry::{self, RetryConfig};
use crate::types::{ChatCompletionOptions, ChatResponse, CompletionResult};

/// Client for the hosted agent proxy.
pub struct RelayClient {
    model: AvailableModel,
    http: reqwest::Client,
    backend_url: String,
    auth_token: String,
    fingerprint_id: String,
    retry: RetryConfig,
}

impl RelayClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] when `backend_url`,
    /// `auth_token`, or `fingerprint_id` is missing; no network call is
    /// attempted.
    pub fn new(model: AvailableModel, options: RelayClientOptions) -> Result<Self> {
        let backend_url = options.backend_url.clone().ok_or_else(|| {
            LlmError::NotConfigured("backend_url must be provided for the relay client".into())
        })?;
        let auth_token = options.auth_token.clone().ok_or_else(|| {
            LlmError::NotConfigured("auth_token must be provided for the relay client".into())
        })?;
        let fingerprint_id = options.fingerprint_id.clone().ok_or_else(|| {
            LlmError::NotConfigured("fingerprint_id must be provided for the relay client".into())
        })?;
        Ok(Self {
            model,
            http: http_client(options.timeout_secs)?,
            backend_url,
            auth_token,
            fingerprint_id,
            retry: RetryConfig::with_max_retries(options.max_retries),
        })
    }

    /// Replace the retry configuration, overriding the default backoff.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn browser_url(&self) -> String {
        let base = self.backend_url.trim_end_matches('/');
        format!("{base}/browser")
    }

    async fn attempt(&self, options: &ChatCompletionOptions) -> Result<CompletionResult> {
        let response = self
            .http
            .post(self.browser_url())
            .header("Authorization", format!("Bearer {}", self.auth_token))
            .header("X-Fingerprint-ID", &self.fingerprint_id)
            .header("Content-Type", "application/json")
            .json(options)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                provider = "relay",
                status = status.as_u16(),
                "relay service returned an error"
            );
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        // The remote side already validated structured output.
        if options.response_model.is_some() {
            return Ok(CompletionResult::Structured(value));
        }

        let chat: ChatResponse = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidResponse(format!("unexpected response shape: {e}")))?;
        Ok(CompletionResult::Chat(chat))
    }
}

#[async_trait]
impl LlmClient for RelayClient {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Relay
    }

    fn model(&self) -> AvailableModel {
        self.model
    }

    async fn create_chat_completion(
        &self,
        options: &ChatCompletionOptions,
    ) -> Result<CompletionResult> {
        debug!(
            provider = "relay",
            model = %self.model,
            request_id = %options.request_id,
            "forwarding chat completion to relay proxy"
        );
        let result = retry::run(&self.retry, "relay", |_| self.attempt(options)).await?;
        debug!(
            provider = "relay",
            request_id = %options.request_id,
            "received response from relay proxy"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("model", &self.model)
            .field("backend_url", &self.backend_url)
            .field("auth_token", &"***")
            .field("fingerprint_id", &self.fingerprint_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_options() -> RelayClientOptions {
        RelayClientOptions {
            backend_url: Some("https://proxy.example.com".into()),
            auth_token: Some("tok-123".into()),
            fingerprint_id: Some("fp-456".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_backend_url_fails_construction() {
        let mut options = full_options();
        options.backend_url = None;
        let err = RelayClient::new(AvailableModel::RelayLatest, options).unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert!(err.to_string().contains("backend_url"));
    }

    #[test]
    fn missing_auth_token_fails_construction() {
        let mut options = full_options();
        options.auth_token = None;
        let err = RelayClient::new(AvailableModel::RelayLatest, options).unwrap_err();
        assert!(err.to_string().contains("auth_token"));
    }

    #[test]
    fn missing_fingerprint_fails_construction() {
        let mut options = full_options();
        options.fingerprint_id = None;
        let err = RelayClient::new(AvailableModel::RelayLatest, options).unwrap_err();
        assert!(err.to_string().contains("fingerprint_id"));
    }

    #[test]
    fn browser_url_strips_trailing_slash() {
        let mut options = full_options();
        options.backend_url = Some("https://proxy.example.com/".into());
        let client = RelayClient::new(AvailableModel::RelayLatest, options).unwrap();
        assert_eq!(client.browser_url(), "https://proxy.example.com/browser");
    }

    #[test]
    fn debug_hides_auth_token() {
        let client = RelayClient::new(AvailableModel::RelayLatest, full_options()).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("tok-123"));
        assert!(debug.contains("***"));
    }
}
