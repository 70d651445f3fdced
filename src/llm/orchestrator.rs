//! Conversation orchestrator.
//!
//! The orchestrator runs one chat turn end to end:
//! 1. Resolve the session's history (creating it on first use)
//! 2. Assemble `[system, history.., user]` from the *existing* history
//! 3. Invoke the model through a cached [`ChatChain`](super::ChatChain)
//! 4. On success, append the user message and the reply, in that order
//!
//! A failed invocation leaves history untouched and the upstream error is
//! returned as-is. There is no retry.
//!
//! # Example
//!
//! ```rust,ignore
//! let reply = orchestrator.turn("s1", "be terse", "Hello", &api_key, 0.2).await?;
//! assert_eq!(orchestrator.history("s1").len(), 2);
//! ```

use crate::error::UpstreamError;
use crate::session::SessionStore;

use super::{ChainCache, Message};

/// Ties the session registry, prompt assembly, and model invocation together.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    sessions: SessionStore,
    chains: ChainCache,
}

impl Orchestrator {
    /// Create an orchestrator over an explicitly constructed registry and cache.
    #[must_use]
    pub fn new(sessions: SessionStore, chains: ChainCache) -> Self {
        Self { sessions, chains }
    }

    /// The session registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The model client cache.
    #[must_use]
    pub fn chains(&self) -> &ChainCache {
        &self.chains
    }

    /// Run one user turn and return the model's reply.
    ///
    /// An unknown `session_id` starts a new conversation.
    ///
    /// # Errors
    ///
    /// Returns the [`UpstreamError`] from the model call unchanged. History is
    /// not modified in that case.
    pub async fn turn(
        &self,
        session_id: &str,
        system_prompt: &str,
        user_text: &str,
        api_key: &str,
        temperature: f32,
    ) -> Result<String, UpstreamError> {
        let session = self.sessions.get_or_create(session_id);
        let history = session.messages();
        let chain = self.chains.get_or_build(api_key, temperature, system_prompt);

        tracing::info!(
            session_id = %session_id,
            message_count = history.len(),
            temperature,
            "Starting chat turn"
        );
        tracing::trace!(session_id = %session_id, input = %user_text, "User input");

        let reply = match chain.invoke(&history, user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Model invocation failed");
                return Err(e);
            }
        };

        session.append_turn(user_text, reply.as_str());

        tracing::info!(
            session_id = %session_id,
            message_count = session.message_count(),
            reply_length = reply.len(),
            "Chat turn complete"
        );

        Ok(reply)
    }

    /// Clear a session's history, keeping its identifier.
    ///
    /// Returns `false` if the session did not exist.
    pub fn reset(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => {
                session.clear();
                tracing::info!(session_id = %session_id, "Session reset");
                true
            }
            None => false,
        }
    }

    /// Start a new conversation under a freshly minted identifier.
    ///
    /// The previous session, if any, is dropped from the registry so its
    /// history is no longer reachable.
    #[must_use]
    pub fn new_chat(&self, previous: Option<&str>) -> String {
        if let Some(old) = previous
            && self.sessions.remove(old).is_some()
        {
            tracing::info!(session_id = %old, "Dropped previous session");
        }
        let session = self.sessions.create();
        tracing::info!(session_id = %session.id(), "Started new chat");
        session.id().to_string()
    }

    /// Snapshot of a session's history. Unknown sessions read as empty and
    /// are not created.
    #[must_use]
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .get(session_id)
            .map(|s| s.messages())
            .unwrap_or_default()
    }
}
