//! Provider selection and client construction.
//!
//! [`LlmProvider`] is the single entry point for callers: it resolves a
//! model name to its provider, applies the backend-URL override, and wires
//! the concrete client to the shared response cache.

use std::sync::Arc;

use tracing::debug;

use pagepilot_types::{AvailableModel, ClientOptions, ModelProvider};

use crate::anthropic::AnthropicClient;
use crate::backend::BackendClient;
use crate::cache::LlmCache;
use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::openai::OpenAiClient;
use crate::relay::RelayClient;

/// Router and factory for provider clients.
///
/// Holds the provider-wide response cache. Client instances are created
/// per [`get_client`](Self::get_client) call and are stateless apart from
/// their shared cache handle.
pub struct LlmProvider {
    enable_caching: bool,
    cache: Option<Arc<LlmCache>>,
}

impl LlmProvider {
    /// Create a provider. When `enable_caching` is false no cache is
    /// attached and [`clean_request_cache`](Self::clean_request_cache) is
    /// a no-op.
    pub fn new(enable_caching: bool) -> Self {
        Self {
            enable_caching,
            cache: enable_caching.then(|| Arc::new(LlmCache::new())),
        }
    }

    /// Handle to the shared cache, when caching is enabled.
    pub fn cache(&self) -> Option<Arc<LlmCache>> {
        self.cache.clone()
    }

    /// Delete all cache entries tagged with `request_id`. Called by the
    /// browser-automation layer once a logical action completes.
    pub fn clean_request_cache(&self, request_id: &str) {
        let Some(ref cache) = self.cache else {
            return;
        };
        debug!(request_id, "cleaning up request cache");
        cache.delete_for_request_id(request_id);
    }

    /// Construct the client for `model_name`.
    ///
    /// The model's static provider mapping decides the client, with one
    /// override: backend- or relay-flavored options (those carrying a
    /// backend URL) force their provider, letting any model name be
    /// redirected through a self-hosted relay.
    ///
    /// # Errors
    ///
    /// [`LlmError::UnsupportedModel`] for a model name outside the
    /// supported set; [`LlmError::NotConfigured`] when the options do not
    /// fit the resolved provider or required fields are missing.
    pub fn get_client(
        &self,
        model_name: &str,
        options: Option<ClientOptions>,
    ) -> Result<Box<dyn LlmClient>> {
        let model: AvailableModel = model_name
            .parse()
            .map_err(|_| LlmError::UnsupportedModel(model_name.to_string()))?;

        let provider = match options {
            Some(ClientOptions::Backend(_)) => ModelProvider::Backend,
            Some(ClientOptions::Relay(_)) => ModelProvider::Relay,
            _ => model.provider(),
        };

        debug!(model = %model, provider = %provider, "constructing LLM client");

        match provider {
            ModelProvider::OpenAi => {
                let client_options = match options {
                    None => Default::default(),
                    Some(ClientOptions::OpenAi(opts)) => opts,
                    Some(_) => {
                        return Err(LlmError::NotConfigured(
                            "openai provider requires openai client options".into(),
                        ))
                    }
                };
                Ok(Box::new(OpenAiClient::new(
                    model,
                    client_options,
                    self.cache.clone(),
                )?))
            }
            ModelProvider::Anthropic => {
                let client_options = match options {
                    None => Default::default(),
                    Some(ClientOptions::Anthropic(opts)) => opts,
                    Some(_) => {
                        return Err(LlmError::NotConfigured(
                            "anthropic provider requires anthropic client options".into(),
                        ))
                    }
                };
                Ok(Box::new(AnthropicClient::new(
                    model,
                    client_options,
                    self.cache.clone(),
                )?))
            }
            ModelProvider::Backend => {
                let Some(ClientOptions::Backend(client_options)) = options else {
                    return Err(LlmError::NotConfigured(
                        "backend provider requires backend client options".into(),
                    ));
                };
                Ok(Box::new(BackendClient::new(
                    model,
                    client_options,
                    self.cache.clone(),
                )?))
            }
            ModelProvider::Relay => {
                let Some(ClientOptions::Relay(client_options)) = options else {
                    return Err(LlmError::NotConfigured(
                        "relay provider requires relay client options".into(),
                    ));
                };
                Ok(Box::new(RelayClient::new(model, client_options)?))
            }
        }
    }
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("enable_caching", &self.enable_caching)
            .field("cache", &self.cache)
            .finish()
    }
}
