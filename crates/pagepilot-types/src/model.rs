//! Supported model identifiers and their provider mapping.
//!
//! [`AvailableModel`] is a closed enumeration: every model the layer knows
//! how to drive maps to exactly one [`ModelProvider`] at configuration time.
//! Callers can still redirect any model through a self-hosted backend via
//! the client-option override in the router.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The backend responsible for serving a given model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// OpenAI chat completions API.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// A self-hosted OpenAI-compatible relay (`{backend_url}/chat/completions`).
    Backend,
    /// The hosted agent proxy (`{backend_url}/browser`).
    Relay,
}

impl ModelProvider {
    /// Stable lowercase name, used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::Backend => "backend",
            ModelProvider::Relay => "relay",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model name that is not in the supported set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported model: {0}")]
pub struct UnsupportedModelError(pub String);

macro_rules! available_models {
    ($(($variant:ident, $name:literal, $provider:ident)),+ $(,)?) => {
        /// The closed set of model identifiers this layer supports.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum AvailableModel {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl AvailableModel {
            /// The wire-format model name sent to the provider.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AvailableModel::$variant => $name,)+
                }
            }

            /// The provider this model is served by, before any override.
            pub fn provider(&self) -> ModelProvider {
                match self {
                    $(AvailableModel::$variant => ModelProvider::$provider,)+
                }
            }

            /// All supported models.
            pub fn all() -> &'static [AvailableModel] {
                &[$(AvailableModel::$variant,)+]
            }
        }

        impl FromStr for AvailableModel {
            type Err = UnsupportedModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(AvailableModel::$variant),)+
                    other => Err(UnsupportedModelError(other.to_string())),
                }
            }
        }
    };
}

available_models! {
    (Gpt4o, "gpt-4o", OpenAi),
    (Gpt4oMini, "gpt-4o-mini", OpenAi),
    (Gpt4o20240806, "gpt-4o-2024-08-06", OpenAi),
    (O1Mini, "o1-mini", OpenAi),
    (O1Preview, "o1-preview", OpenAi),
    (O3Mini, "o3-mini", OpenAi),
    (Claude35SonnetLatest, "claude-3-5-sonnet-latest", Anthropic),
    (Claude35Sonnet20240620, "claude-3-5-sonnet-20240620", Anthropic),
    (Claude35Sonnet20241022, "claude-3-5-sonnet-20241022", Anthropic),
    (RelayLatest, "relay-latest", Relay),
}

impl fmt::Display for AvailableModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
