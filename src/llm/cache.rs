//! Memoizing factory for model clients.
//!
//! A [`ChatChain`] pairs a model client with the system prompt it answers
//! under. Building one is cheap but not free (header setup, pool lookup), so
//! [`ChainCache`] keeps one per distinct `(api_key, temperature,
//! system_prompt)` and hands out shared handles. Invalidation is up to the
//! caller via [`ChainCache::clear`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::UpstreamError;
use crate::prompt;

use super::{ChatCompletionsClient, ChatModel, LlmSettings, Message};

/// Builds a model client for a credential and temperature.
pub trait ModelBuilder: Send + Sync {
    /// Construct a new client. Called at most once per cache key.
    fn build(&self, api_key: &str, temperature: f32) -> Arc<dyn ChatModel>;
}

/// [`ModelBuilder`] producing [`ChatCompletionsClient`]s that share one
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpModelBuilder {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl HttpModelBuilder {
    /// Create a builder with an HTTP client honoring `settings.timeout_secs`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(settings: LlmSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { http, settings })
    }

    /// Settings applied to every client.
    #[must_use]
    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

impl ModelBuilder for HttpModelBuilder {
    fn build(&self, api_key: &str, temperature: f32) -> Arc<dyn ChatModel> {
        Arc::new(ChatCompletionsClient::new(
            self.http.clone(),
            self.settings.clone(),
            api_key,
            temperature,
        ))
    }
}

/// Cache key. Temperature is keyed by its bit pattern so the key is `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    api_key: String,
    temperature_bits: u32,
    system_prompt: String,
}

impl ChainKey {
    /// Build a key from its three components.
    #[must_use]
    pub fn new(api_key: &str, temperature: f32, system_prompt: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            temperature_bits: temperature.to_bits(),
            system_prompt: system_prompt.to_string(),
        }
    }
}

/// A model client bound to a system prompt.
pub struct ChatChain {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl std::fmt::Debug for ChatChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatChain")
            .field("system_prompt", &self.system_prompt)
            .finish_non_exhaustive()
    }
}

impl ChatChain {
    /// Bind `model` to `system_prompt`.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
        }
    }

    /// The system prompt sent ahead of history.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Assemble `[system, history.., user(input)]` and request a reply.
    pub async fn invoke(&self, history: &[Message], input: &str) -> Result<String, UpstreamError> {
        let request = prompt::assemble(&self.system_prompt, history, input);
        self.model.complete(&request).await
    }
}

/// Memoizing factory of [`ChatChain`]s.
#[derive(Clone)]
pub struct ChainCache {
    inner: Arc<ChainCacheInner>,
}

struct ChainCacheInner {
    builder: Box<dyn ModelBuilder>,
    chains: Mutex<HashMap<ChainKey, Arc<ChatChain>>>,
}

impl std::fmt::Debug for ChainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ChainCache {
    /// Create an empty cache backed by `builder`.
    #[must_use]
    pub fn new(builder: impl ModelBuilder + 'static) -> Self {
        Self {
            inner: Arc::new(ChainCacheInner {
                builder: Box::new(builder),
                chains: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return the chain for this combination, building it on first use.
    #[must_use]
    pub fn get_or_build(&self, api_key: &str, temperature: f32, system_prompt: &str) -> Arc<ChatChain> {
        let key = ChainKey::new(api_key, temperature, system_prompt);
        let mut guard = self.inner.chains.lock().unwrap();
        Arc::clone(guard.entry(key).or_insert_with(|| {
            tracing::debug!(temperature, "Building chat chain");
            let model = self.inner.builder.build(api_key, temperature);
            Arc::new(ChatChain::new(model, system_prompt))
        }))
    }

    /// Number of cached chains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.chains.lock().unwrap().len()
    }

    /// Check if nothing has been built yet (or since the last clear).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached chain. Handles already given out stay usable.
    pub fn clear(&self) {
        self.inner.chains.lock().unwrap().clear();
    }
}
