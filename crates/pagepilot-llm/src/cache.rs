//! Response cache keyed by a deterministic request fingerprint.
//!
//! LLM calls are slow and expensive, and repeated identical requests
//! (retried browser steps) are common, so every client consults this cache
//! before touching the network. The lookup key is a sha256 digest of the
//! request content; the `request_id` is only a scope tag recorded on reads
//! and writes so a caller can invalidate everything one logical operation
//! touched via [`LlmCache::delete_for_request_id`].
//!
//! There is no other eviction policy: entries live for the process
//! lifetime unless explicitly invalidated.

use std::collections::HashSet;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{ChatMessage, ImageInput, ResponseModel};

/// The request content that makes up the cache key.
///
/// Two requests with identical `CacheOptions` share one entry regardless
/// of `request_id`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheOptions {
    /// Wire-format model name.
    pub model: String,

    /// Messages as transmitted (image already appended).
    pub messages: Vec<ChatMessage>,

    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,

    /// Attached image, if any. The raw bytes participate in the key.
    pub image: Option<ImageInput>,

    /// Structured-output descriptor, if any.
    pub response_model: Option<ResponseModel>,
}

/// Concurrency-safe in-memory response cache.
pub struct LlmCache {
    entries: DashMap<String, serde_json::Value>,
    /// Keys touched (read or written) under each request id.
    request_tags: DashMap<String, HashSet<String>>,
}

impl LlmCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            request_tags: DashMap::new(),
        }
    }

    /// Deterministic fingerprint of the request content. Field order in
    /// [`CacheOptions`] is fixed, so the canonical JSON form is stable.
    pub fn fingerprint(options: &CacheOptions) -> Result<String> {
        let canonical = serde_json::to_vec(options)?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(digest))
    }

    /// Look up a cached response, tagging the entry with `request_id`.
    ///
    /// Returns `None` on a miss, or when the cached value does not
    /// deserialize into `T` (a miss is never an error).
    pub fn get<T: DeserializeOwned>(&self, options: &CacheOptions, request_id: &str) -> Option<T> {
        let key = match Self::fingerprint(options) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, "failed to fingerprint cache options");
                return None;
            }
        };

        let value = self.entries.get(&key)?.value().clone();
        self.tag(request_id, key.clone());

        match serde_json::from_value(value) {
            Ok(decoded) => {
                debug!(request_id, key = %key, "cache hit");
                Some(decoded)
            }
            Err(error) => {
                warn!(request_id, key = %key, %error, "cached value failed to decode");
                None
            }
        }
    }

    /// Store a response, overwriting any entry for the same fingerprint,
    /// and tag it with `request_id`.
    pub fn set<T: Serialize>(&self, options: &CacheOptions, value: &T, request_id: &str) -> Result<()> {
        let key = Self::fingerprint(options)?;
        let encoded = serde_json::to_value(value)?;
        self.entries.insert(key.clone(), encoded);
        self.tag(request_id, key.clone());
        debug!(request_id, key = %key, "cached response");
        Ok(())
    }

    /// Remove all entries tagged with `request_id`. Silent no-op when
    /// nothing matches.
    pub fn delete_for_request_id(&self, request_id: &str) {
        let Some((_, keys)) = self.request_tags.remove(request_id) else {
            return;
        };
        for key in &keys {
            self.entries.remove(key);
        }
        debug!(request_id, removed = keys.len(), "cleaned request cache");
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tag(&self, request_id: &str, key: String) {
        self.request_tags
            .entry(request_id.to_string())
            .or_default()
            .insert(key);
    }
}

impl Default for LlmCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LlmCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCache")
            .field("entries", &self.entries.len())
            .field("request_tags", &self.request_tags.len())
            .finish()
    }
}
