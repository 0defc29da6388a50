//! Request and response types for chat completion calls.
//!
//! The request side is provider-neutral: each client adapts
//! [`ChatCompletionOptions`] to its own wire format. The response side
//! mirrors the OpenAI chat completion shape, which the backend relay also
//! speaks, and which the Anthropic client normalizes into.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The role of the message author ("system", "user", "assistant").
    pub role: String,

    /// The content of the message.
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a plain-text message with role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// The message text: the plain string, or the concatenation of the
    /// text parts for multi-part content.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Message content: plain text or an ordered sequence of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multi-part content (text and image-url parts).
    Parts(Vec<ContentPart>),
}

/// A single typed part within multi-part message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text fragment.
    Text {
        /// The text.
        text: String,
    },
    /// An inline image reference.
    ImageUrl {
        /// The image URL (typically a base64 data URL).
        image_url: ImageUrl,
    },
}

/// The URL of an inline image part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    /// A regular URL or a `data:image/...;base64,...` data URL.
    pub url: String,
}

/// A screenshot (or other image) attached to a completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageInput {
    /// Raw JPEG bytes.
    pub buffer: Vec<u8>,

    /// Optional text accompanying the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ImageInput {
    /// Base64 data URL for inline transmission.
    pub fn data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.buffer);
        format!("data:image/jpeg;base64,{encoded}")
    }

    /// The user-role message this image is transmitted as: a data-URL
    /// image part followed by an optional text part for the description.
    pub fn to_message(&self) -> ChatMessage {
        let mut parts = vec![ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: self.data_url(),
            },
        }];
        if let Some(ref description) = self.description {
            parts.push(ContentPart::Text {
                text: description.clone(),
            });
        }
        ChatMessage {
            role: "user".into(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// A structured-output request: the model's reply must parse and validate
/// against this JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseModel {
    /// Schema name, forwarded to providers that label response formats.
    pub name: String,

    /// The JSON schema the response must satisfy.
    pub schema: serde_json::Value,
}

/// A tool the model may invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,

    /// What the tool does.
    pub description: String,

    /// JSON schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A provider-neutral chat completion request.
///
/// Invariant: `messages` is non-empty. If `image` is present, it is
/// appended as a trailing user message with an inline base64 data URL
/// before transmission (see [`ChatCompletionOptions::transmission_messages`]).
/// `request_id` scopes cache entries and is never part of the cache key or
/// the wire payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionOptions {
    /// The conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,

    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,

    /// Screenshot to append as a user message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,

    /// Structured-output schema request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_model: Option<ResponseModel>,

    /// Tool definitions available to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Opaque id scoping cache entries to one logical operation.
    pub request_id: String,
}

impl ChatCompletionOptions {
    /// Create a minimal request with messages and a cache-scope id.
    pub fn new(messages: Vec<ChatMessage>, request_id: impl Into<String>) -> Self {
        Self {
            messages,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            image: None,
            response_model: None,
            tools: None,
            request_id: request_id.into(),
        }
    }

    /// The message list as transmitted: the caller's messages, plus the
    /// image appended as a trailing user message when one is attached.
    pub fn transmission_messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.messages.clone();
        if let Some(ref image) = self.image {
            messages.push(image.to_message());
        }
        messages
    }
}

/// A normalized chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    pub id: String,

    /// The list of completion choices.
    pub choices: Vec<Choice>,

    /// Token usage statistics, if the provider reports them.
    #[serde(default)]
    pub usage: Option<Usage>,

    /// The model that generated the response.
    pub model: String,
}

impl ChatResponse {
    /// Text content of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }
}

/// A single completion choice within a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// The index of this choice in the list.
    pub index: i32,

    /// The assistant's response message.
    pub message: ResponseMessage,

    /// Why generation stopped (e.g. "stop", "tool_calls", "length").
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message within a completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// The role of the author, normally "assistant".
    pub role: String,

    /// The text content, absent for pure tool-call replies.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,

    /// The type of tool call. Currently always "function".
    #[serde(rename = "type")]
    pub call_type: String,

    /// The function to invoke.
    pub function: FunctionCall,
}

/// A function invocation within a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,

    /// The arguments as a JSON string.
    pub arguments: String,
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: i32,

    /// Number of tokens in the generated completion.
    pub completion_tokens: i32,

    /// Total tokens used (prompt + completion).
    pub total_tokens: i32,
}

/// The result of a completion call: a normalized chat response, or the
/// parsed-and-validated object when a response schema was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionResult {
    /// A full chat-completion response.
    Chat(ChatResponse),
    /// The structured object matching the requested schema.
    Structured(serde_json::Value),
}

impl CompletionResult {
    /// The chat response, if this is a plain completion.
    pub fn as_chat(&self) -> Option<&ChatResponse> {
        match self {
            CompletionResult::Chat(response) => Some(response),
            CompletionResult::Structured(_) => None,
        }
    }

    /// Deserialize the validated structured object into a caller type.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidResponse`] if this is a plain chat
    /// response, or [`LlmError::Json`] if deserialization fails.
    pub fn into_structured<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            CompletionResult::Structured(value) => Ok(serde_json::from_value(value)?),
            CompletionResult::Chat(_) => Err(LlmError::InvalidResponse(
                "no response schema was requested for this completion".into(),
            )),
        }
    }
}
