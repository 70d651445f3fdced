//! Provider-specific URL and header handling.
//!
//! Every supported provider speaks the `OpenAI` chat completions dialect; they
//! differ in where the endpoint lives and whether app identification headers
//! are meaningful.

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use session_chat::llm::Provider;
    ///
    /// assert_eq!(Provider::detect_from_url("https://openrouter.ai/api"), Provider::OpenRouter);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Whether `HTTP-Referer` / `X-Title` should accompany requests.
    ///
    /// `OpenRouter` uses them for app attribution. Generic endpoints get them
    /// too since local proxies often forward to `OpenRouter`.
    #[must_use]
    pub fn sends_app_headers(self) -> bool {
        matches!(self, Self::OpenRouter | Self::Generic)
    }

    /// Build the chat completions URL for this provider.
    ///
    /// Groq nests its `OpenAI` surface under `/openai`.
    #[must_use]
    pub fn build_chat_url(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::Groq if !base.ends_with("/openai") => format!("{base}/openai/v1/chat/completions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}
