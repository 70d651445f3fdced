//! Model invocation and conversation orchestration.
//!
//! This module talks to an OpenAI-compatible chat completion endpoint
//! (`OpenRouter` by default) and threads per-session history through every
//! request.
//!
//! # Overview
//!
//! The [`ChatModel`] trait is the seam between the orchestrator and the
//! remote API. [`ChatCompletionsClient`] implements it over HTTP;
//! [`ChainCache`] memoizes one client per `(api_key, temperature,
//! system_prompt)` combination, and [`Orchestrator`] runs a full turn.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_chat::llm::{ChainCache, HttpModelBuilder, LlmSettings, Orchestrator};
//! use session_chat::session::SessionStore;
//!
//! let cache = ChainCache::new(HttpModelBuilder::new(LlmSettings::default())?);
//! let orchestrator = Orchestrator::new(SessionStore::new(), cache);
//! let reply = orchestrator.turn("s1", "be terse", "Hello", "sk-or-...", 0.2).await?;
//! ```

pub mod cache;
pub mod chat_completions;
pub mod orchestrator;
pub mod provider;

pub use cache::{ChainCache, ChainKey, ChatChain, HttpModelBuilder, ModelBuilder};
pub use chat_completions::ChatCompletionsClient;
pub use orchestrator::Orchestrator;
pub use provider::Provider;

use crate::error::UpstreamError;

/// Default model served through `OpenRouter`.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

/// Default `OpenRouter` API root. The client appends `/v1/chat/completions`.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Connection and model settings shared by every client the cache builds.
///
/// The API key and temperature are not part of the settings; they arrive per
/// turn and key the client cache.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the API (e.g., `https://openrouter.ai/api`).
    pub base_url: String,
    /// Model identifier (e.g., `deepseek/deepseek-chat`).
    pub model: String,
    /// Provider, detected from `base_url`.
    pub provider: Provider,
    /// Outbound request timeout in seconds.
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer` to identify the calling application.
    pub app_url: String,
    /// Sent as `X-Title` to identify the calling application.
    pub app_title: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: Provider::OpenRouter,
            timeout_secs: 60,
            app_url: "http://localhost:3000".to_string(),
            app_title: "session-chat".to_string(),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

impl MessageRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat model that turns an ordered message list into one reply.
///
/// Implementations carry their own credential and temperature; callers only
/// supply the assembled messages.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Request a single completion for `messages`.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] when the request cannot be sent, the
    /// provider rejects it, or the reply cannot be read.
    async fn complete(&self, messages: &[Message]) -> Result<String, UpstreamError>;
}
