//! Session Chat
//!
//! A minimal web chat backed by an OpenAI-compatible completion API, with
//! per-session conversation memory held in process.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server with an HTML chat page and a JSON API
//! - **LLM**: Chat Completions client, memoizing client cache, orchestrator
//! - **Sessions**: In-memory registry of ordered conversation histories
//!
//! # Modules
//!
//! - [`config`]: Layered configuration and credential loading
//! - [`error`]: Error taxonomy
//! - [`llm`]: Model invocation and turn orchestration
//! - [`prompt`]: Request assembly
//! - [`server`]: HTTP surface
//! - [`session`]: Conversation and session management

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod session;

use std::sync::Arc;

use crate::config::AppConfig;
use llm::orchestrator::Orchestrator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Conversation orchestrator (owns the session registry and client cache).
    pub orchestrator: Arc<Orchestrator>,
    /// Provider credential used for every turn.
    pub api_key: Arc<str>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("api_key", &"<redacted>")
            .field("config", &self.config)
            .finish()
    }
}
