//! Per-provider client options.
//!
//! Required fields are kept as `Option<String>` so that options can be
//! deserialized from partial configuration; the client constructors
//! validate them and fail fast with a configuration error when a required
//! field is missing. Presence of a backend URL doubles as the routing
//! override signal: any model name can be redirected through a self-hosted
//! relay by passing backend- or relay-flavored options.

use serde::{Deserialize, Serialize};

/// Options for the OpenAI-backed client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiClientOptions {
    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Organization header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Override for the API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Retry budget for transient and schema-validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// HTTP-level request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Options for the Anthropic-backed client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicClientOptions {
    /// API key. Falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Retry budget for transient and schema-validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// HTTP-level request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Options for the generic HTTP-backend client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendClientOptions {
    /// Base URL of the self-hosted relay. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    /// Optional API key forwarded by the relay, unused on the wire here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Retry budget for transient and schema-validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// HTTP-level request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Options for the remote agent-proxy client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayClientOptions {
    /// Base URL of the hosted proxy. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    /// Bearer token for the proxy. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Device fingerprint sent as `X-Fingerprint-ID`. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_id: Option<String>,

    /// Retry budget for transport failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// HTTP-level request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Options for one of the concrete provider clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientOptions {
    OpenAi(OpenAiClientOptions),
    Anthropic(AnthropicClientOptions),
    Backend(BackendClientOptions),
    Relay(RelayClientOptions),
}

impl ClientOptions {
    /// The backend URL carried by backend- or relay-flavored options.
    ///
    /// This is the router's override signal: when present, the resolved
    /// provider is forced to the backend (or relay) provider regardless of
    /// the model-to-provider mapping.
    pub fn backend_url(&self) -> Option<&str> {
        match self {
            ClientOptions::Backend(opts) => opts.backend_url.as_deref(),
            ClientOptions::Relay(opts) => opts.backend_url.as_deref(),
            _ => None,
        }
    }

    /// The retry budget, if configured.
    pub fn max_retries(&self) -> Option<u32> {
        match self {
            ClientOptions::OpenAi(opts) => opts.max_retries,
            ClientOptions::Anthropic(opts) => opts.max_retries,
            ClientOptions::Backend(opts) => opts.max_retries,
            ClientOptions::Relay(opts) => opts.max_retries,
        }
    }

    /// The HTTP timeout in seconds, if configured.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            ClientOptions::OpenAi(opts) => opts.timeout_secs,
            ClientOptions::Anthropic(opts) => opts.timeout_secs,
            ClientOptions::Backend(opts) => opts.timeout_secs,
            ClientOptions::Relay(opts) => opts.timeout_secs,
        }
    }
}
