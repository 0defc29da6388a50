//! Shared types for the pagepilot LLM layer.
//!
//! This crate holds the model identifier enumeration and the per-provider
//! client option types. It has no HTTP or async dependencies so the
//! browser-automation crates can depend on it without pulling in the full
//! LLM stack.

pub mod model;
pub mod options;

pub use model::{AvailableModel, ModelProvider, UnsupportedModelError};
pub use options::{
    AnthropicClientOptions, BackendClientOptions, ClientOptions, OpenAiClientOptions,
    RelayClientOptions,
};
