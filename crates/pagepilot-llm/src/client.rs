//! The [`LlmClient`] capability trait and wire helpers shared by the
//! concrete provider clients.

use async_trait::async_trait;
use jsonschema::JSONSchema;
use std::time::Duration;

use pagepilot_types::{AvailableModel, ModelProvider};

use crate::cache::CacheOptions;
use crate::error::{LlmError, Result};
use crate::types::{ChatCompletionOptions, CompletionResult, ResponseModel, ToolDefinition};

/// A client that can execute chat completion requests against one provider.
///
/// Implementations handle the protocol details for a specific LLM API
/// (authentication, request formatting, response parsing, structured-output
/// translation). Instances are created per [`crate::LlmProvider::get_client`]
/// call and are stateless apart from a shared cache handle.
#[async_trait]
pub trait LlmClient: std::fmt::Debug + Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> ModelProvider;

    /// The model this client was constructed for.
    fn model(&self) -> AvailableModel;

    /// Execute a chat completion request.
    ///
    /// Consults the shared cache first when caching is enabled; on a miss,
    /// sends the wire request with bounded retries for transport and
    /// schema-validation failures, caches the result, and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] once the retry budget is exhausted or on a
    /// terminal failure (auth rejection, upstream proxy error, bad config).
    async fn create_chat_completion(
        &self,
        options: &ChatCompletionOptions,
    ) -> Result<CompletionResult>;
}

/// Build the per-client reqwest client, applying the optional caller
/// timeout at the HTTP level.
pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// The cache-key material for a request: everything that determines the
/// response, explicitly excluding `request_id`.
pub(crate) fn cache_options(model: AvailableModel, options: &ChatCompletionOptions) -> CacheOptions {
    CacheOptions {
        model: model.as_str().to_string(),
        messages: options.transmission_messages(),
        temperature: options.temperature,
        top_p: options.top_p,
        frequency_penalty: options.frequency_penalty,
        presence_penalty: options.presence_penalty,
        image: options.image.clone(),
        response_model: options.response_model.clone(),
    }
}

/// Map a non-success provider response to an error, in the shape the retry
/// classifier understands (429 → rate limited, 401/403 → auth, otherwise
/// `HTTP {status}: {body}`).
pub(crate) async fn error_for_status(response: reqwest::Response) -> LlmError {
    let status = response.status();

    if status.as_u16() == 429 {
        let header_ms = parse_retry_after_header(&response);
        let body = response.text().await.unwrap_or_default();
        let retry_after_ms = header_ms.or_else(|| parse_retry_after_ms(&body)).unwrap_or(1000);
        return LlmError::RateLimited { retry_after_ms };
    }

    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return LlmError::AuthFailed(body);
    }

    LlmError::RequestFailed(format!("HTTP {status}: {body}"))
}

/// Try to extract a retry-after value from the HTTP `Retry-After` header.
///
/// The header value can be either seconds (integer or float) or an
/// HTTP-date. Only the numeric form is handled; HTTP-date is rare for API
/// providers.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let header_val = response
        .headers()
        .get("retry-after")
        .or_else(|| response.headers().get("x-ratelimit-reset-after"))
        .and_then(|v| v.to_str().ok())?;

    if let Ok(secs) = header_val.parse::<f64>() {
        return Some((secs * 1000.0).max(0.0) as u64);
    }

    None
}

/// Try to extract a retry-after value from a JSON error response body.
fn parse_retry_after_ms(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            value
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| (secs * 1000.0) as u64)
        })
}

/// Parse a model's textual payload and validate it against the requested
/// schema. Both failure modes are schema-validation errors, which the
/// retry loop re-queries for.
pub(crate) fn parse_structured_payload(
    response_model: &ResponseModel,
    payload: &str,
) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        LlmError::InvalidResponseSchema(format!(
            "payload for '{}' is not valid JSON: {e}",
            response_model.name
        ))
    })?;
    validate_structured_value(response_model, value)
}

/// Validate an already-parsed value against the requested schema.
pub(crate) fn validate_structured_value(
    response_model: &ResponseModel,
    value: serde_json::Value,
) -> Result<serde_json::Value> {
    let compiled = JSONSchema::compile(&response_model.schema).map_err(|e| {
        LlmError::InvalidResponseSchema(format!(
            "schema '{}' does not compile: {e}",
            response_model.name
        ))
    })?;

    if !compiled.is_valid(&value) {
        return Err(LlmError::InvalidResponseSchema(format!(
            "payload does not match schema '{}'",
            response_model.name
        )));
    }

    Ok(value)
}

/// Rehydrate a cached value into the result shape the caller asked for.
pub(crate) fn wrap_cached(
    options: &ChatCompletionOptions,
    value: serde_json::Value,
) -> CompletionResult {
    if options.response_model.is_some() {
        CompletionResult::Structured(value)
    } else {
        match serde_json::from_value::<crate::types::ChatResponse>(value.clone()) {
            Ok(chat) => CompletionResult::Chat(chat),
            // Shape drift in the cache entry: fall back to the raw value.
            Err(_) => CompletionResult::Structured(value),
        }
    }
}

/// The JSON form a result is cached as.
pub(crate) fn cached_value(result: &CompletionResult) -> serde_json::Value {
    match result {
        CompletionResult::Chat(chat) => {
            serde_json::to_value(chat).unwrap_or(serde_json::Value::Null)
        }
        CompletionResult::Structured(value) => value.clone(),
    }
}

/// OpenAI-style `response_format` object for a structured-output request.
pub(crate) fn openai_response_format(response_model: &ResponseModel) -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": response_model.name,
            "schema": response_model.schema,
            "strict": true,
        }
    })
}

/// OpenAI-style function-tool definitions.
pub(crate) fn openai_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|tool| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}
