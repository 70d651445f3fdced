//! Error taxonomy for configuration, upstream model calls, and chat turns.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The API credential env var is absent or blank.
    #[error(
        "{var} is not set. Put it in .env or export it in the environment before starting the server."
    )]
    MissingApiKey {
        /// Name of the env var that was checked.
        var: &'static str,
    },

    /// Temperature outside the range accepted by the completion API.
    #[error("Invalid temperature {0}: expected a value between 0.0 and 2.0")]
    InvalidTemperature(f32),

    /// Layered configuration failed to build or deserialize.
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// Command line arguments could not be parsed.
    #[error("{0}")]
    Cli(String),
}

/// Failures reported by the remote completion endpoint or the transport to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Credential missing or rejected by the provider.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider throttled the request.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Connection, timeout, or body transfer failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success status.
    #[error("Provider returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Success status but the body carried no usable reply.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// Classify a non-success HTTP status from the provider.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited(body),
            _ => Self::Api { status, body },
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Error returned from a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Upstream failure, passed through untouched.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Request rejected before reaching the model.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChatError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(UpstreamError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(UpstreamError::Network(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status = %status, error = %self, "Chat request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
