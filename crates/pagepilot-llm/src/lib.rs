//! LLM provider abstraction for pagepilot.
//!
//! The browser-automation layer delegates natural-language actions
//! ("click the docs link") to an LLM; this crate owns everything between
//! that layer and the model APIs: interchangeable provider clients, a
//! response cache keyed by request content, and a bounded retry pipeline
//! with structured-output validation.
//!
//! # Architecture
//!
//! - [`LlmClient`] trait defines the chat completion capability
//! - [`OpenAiClient`], [`AnthropicClient`], [`BackendClient`], and
//!   [`RelayClient`] implement it for the supported wire protocols
//! - [`LlmProvider`] routes model names to clients and owns the shared
//!   [`LlmCache`]
//! - [`retry`] is the single bounded-retry/backoff helper used by every
//!   client, for transport failures and for structured output that fails
//!   schema validation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pagepilot_llm::{ChatCompletionOptions, ChatMessage, LlmProvider};
//!
//! let provider = LlmProvider::new(true);
//! let client = provider.get_client("gpt-4o", None)?;
//!
//! let options = ChatCompletionOptions::new(
//!     vec![
//!         ChatMessage::system("You drive a web browser."),
//!         ChatMessage::user("click the docs link"),
//!     ],
//!     "request-123",
//! );
//!
//! let result = client.create_chat_completion(&options).await?;
//! provider.clean_request_cache("request-123");
//! ```

pub mod anthropic;
pub mod backend;
pub mod cache;
pub mod client;
pub mod error;
pub mod openai;
pub mod provider;
pub mod relay;
pub mod retry;
pub mod types;

pub use anthropic::AnthropicClient;
pub use backend::BackendClient;
pub use cache::{CacheOptions, LlmCache};
pub use client::LlmClient;
pub use error::{LlmError, Result};
pub use openai::OpenAiClient;
pub use provider::LlmProvider;
pub use relay::RelayClient;
pub use retry::{RetryConfig, compute_delay, is_retryable};
pub use types::{
    ChatCompletionOptions, ChatMessage, ChatResponse, Choice, CompletionResult, ContentPart,
    FunctionCall, ImageInput, ImageUrl, MessageContent, ResponseMessage, ResponseModel, ToolCall,
    ToolDefinition, Usage,
};

pub use pagepilot_types::{
    AnthropicClientOptions, AvailableModel, BackendClientOptions, ClientOptions, ModelProvider,
    OpenAiClientOptions, RelayClientOptions,
};
