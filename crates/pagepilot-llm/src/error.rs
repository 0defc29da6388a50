//! Error types for the LLM layer.
//!
//! All operations return [`Result<T>`] which uses [`LlmError`] as the
//! error type. Retry classification for these variants lives in
//! [`crate::retry::is_retryable`].

use thiserror::Error;

/// Errors that can occur when routing to or calling an LLM provider.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The requested model name is not in the supported set.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// The resolved provider has no registered constructor. Defensive;
    /// unreachable while the model mapping stays consistent.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// A required client option is missing. Raised at construction,
    /// never retried.
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// Authentication with the provider was rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider returned a rate-limit response (HTTP 429).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait time before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The HTTP request to the provider failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The remote proxy returned a non-success status.
    #[error("upstream service returned {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The provider returned a success response that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Structured output failed to parse or did not match the requested
    /// schema, after the retry budget was exhausted.
    #[error("invalid response schema: {0}")]
    InvalidResponseSchema(String),

    /// A transport-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization error while building a request.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience type alias for LLM layer operations.
pub type Result<T> = std::result::Result<T, LlmError>;
