//! OpenAI-compatible Chat Completions client.
//!
//! This module implements [`ChatModel`] for the Chat Completions API
//! (`/v1/chat/completions`) with a single non-streaming request per turn.

use serde_json::Value;

use crate::error::UpstreamError;

use super::{ChatModel, LlmSettings, Message};

/// Client for one `(api_key, temperature)` pair against the configured model.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: LlmSettings,
    api_key: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("settings", &self.settings)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ChatCompletionsClient {
    /// Create a client that reuses `http` for its connection pool.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        settings: LlmSettings,
        api_key: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            http,
            settings,
            api_key: api_key.into(),
            temperature,
        }
    }

    /// Sampling temperature sent with every request.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for ChatCompletionsClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, UpstreamError> {
        if self.api_key.trim().is_empty() {
            return Err(UpstreamError::Authentication(
                "no API key supplied".to_string(),
            ));
        }

        let url = self.settings.provider.build_chat_url(&self.settings.base_url);

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = messages.len(),
            temperature = self.temperature,
            "Sending chat completion request"
        );

        let mut rb = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages));
        if self.settings.provider.sends_app_headers() {
            rb = rb
                .header("HTTP-Referer", &self.settings.app_url)
                .header("X-Title", &self.settings.app_title);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Provider rejected completion request");
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        let v: Value = resp.json().await?;
        extract_reply(&v)
    }
}

/// Pull the assistant text out of a completion body.
///
/// Some providers answer 200 with an `error` object instead of `choices`;
/// those are classified by the embedded code like a status would be.
fn extract_reply(v: &Value) -> Result<String, UpstreamError> {
    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error")
            .to_string();
        let code = err
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(502);
        return Err(UpstreamError::from_status(code, message));
    }

    v["choices"][0]["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| {
            UpstreamError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_reply() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello there"}}]
        });
        assert_eq!(extract_reply(&body).unwrap(), "Hello there");
    }

    #[test]
    fn test_extract_reply_missing_content() {
        let body = json!({"choices": []});
        assert!(matches!(
            extract_reply(&body),
            Err(UpstreamError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_extract_reply_embedded_error() {
        let body = json!({"error": {"code": 429, "message": "quota"}});
        assert_eq!(
            extract_reply(&body),
            Err(UpstreamError::RateLimited("quota".to_string()))
        );
    }

    #[test]
    fn test_request_body_shape() {
        let client = ChatCompletionsClient::new(
            reqwest::Client::new(),
            LlmSettings::default(),
            "sk-test",
            0.2,
        );
        let body = client.request_body(&[Message::system("be terse"), Message::user("Hi")]);
        assert_eq!(body["model"], "deepseek/deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_blank_key_is_authentication_error() {
        let client =
            ChatCompletionsClient::new(reqwest::Client::new(), LlmSettings::default(), "  ", 0.7);
        let err = client.complete(&[Message::user("Hi")]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Authentication(_)));
    }
}
