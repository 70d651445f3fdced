//! HTTP surface: one server-rendered chat page and a small JSON API.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::{AppConfig, validate_temperature};
use crate::error::ChatError;
use crate::llm::{ChainCache, HttpModelBuilder, Message, MessageRole, Orchestrator};
use crate::session::SessionStore;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, api_key: String) -> anyhow::Result<()> {
    let settings = config.llm_settings();
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        "LLM configuration loaded"
    );

    let chains = ChainCache::new(HttpModelBuilder::new(settings)?);
    let state = build_state(Arc::clone(&config), api_key, chains);
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Assemble the shared state around a fresh session registry.
#[must_use]
pub fn build_state(config: Arc<AppConfig>, api_key: String, chains: ChainCache) -> AppState {
    let orchestrator = Arc::new(Orchestrator::new(SessionStore::new(), chains));
    AppState {
        orchestrator,
        api_key: api_key.into(),
        config,
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(page_chat))
        .route("/new", post(page_new_chat))
        .route("/health", get(|| async { "ok" }))
        .route("/api/chat", post(api_chat))
        .route("/api/sessions", post(api_new_session))
        .route("/api/sessions/{id}/messages", get(api_get_messages))
        .route("/api/sessions/{id}/reset", post(api_reset_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fill in defaults for the per-turn settings and validate them.
fn turn_settings(
    config: &AppConfig,
    system_prompt: Option<String>,
    temperature: Option<f32>,
) -> Result<(String, f32), ChatError> {
    let system_prompt = system_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| config.chat.system_prompt.clone());
    let temperature = validate_temperature(temperature.unwrap_or(config.llm.temperature))
        .map_err(|e| ChatError::InvalidInput(e.to_string()))?;
    Ok((system_prompt, temperature))
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON API
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content.
    message: String,
    /// Optional session ID (creates new if not provided).
    #[serde(default)]
    session_id: Option<String>,
    /// Overrides the configured system prompt.
    #[serde(default)]
    system_prompt: Option<String>,
    /// Overrides the configured temperature.
    #[serde(default)]
    temperature: Option<f32>,
}

/// Response from chat API.
#[derive(Debug, Serialize)]
struct ChatResponse {
    /// Session ID for this conversation.
    session_id: String,
    /// Model reply.
    reply: String,
}

/// POST /api/chat - Run one turn.
async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    if req.message.trim().is_empty() {
        return Err(ChatError::InvalidInput("message must not be empty".to_string()));
    }
    let (system_prompt, temperature) =
        turn_settings(&state.config, req.system_prompt, req.temperature)?;

    let session_id = match req.session_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => state.orchestrator.new_chat(None),
    };

    let reply = state
        .orchestrator
        .turn(
            &session_id,
            &system_prompt,
            &req.message,
            &state.api_key,
            temperature,
        )
        .await?;

    Ok(Json(ChatResponse { session_id, reply }))
}

/// Query for starting a new chat.
#[derive(Debug, Deserialize)]
struct NewSessionQuery {
    /// Session being replaced; its history is dropped.
    #[serde(default)]
    previous: Option<String>,
}

/// Response carrying a session ID.
#[derive(Debug, Serialize)]
struct SessionResponse {
    session_id: String,
}

/// POST /api/sessions - Start a new chat.
async fn api_new_session(
    State(state): State<AppState>,
    Query(query): Query<NewSessionQuery>,
) -> (StatusCode, Json<SessionResponse>) {
    let session_id = state.orchestrator.new_chat(query.previous.as_deref());
    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

/// POST /api/sessions/:id/reset - Clear history, keep the ID.
async fn api_reset_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.orchestrator.reset(&id);
    StatusCode::NO_CONTENT
}

/// Message DTO for API responses.
#[derive(Debug, Serialize)]
struct MessageDto {
    role: String,
    content: String,
}

/// GET /api/sessions/:id/messages - Session history. Unknown IDs read as empty.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<MessageDto>> {
    let messages = state
        .orchestrator
        .history(&id)
        .into_iter()
        .map(|m| MessageDto {
            role: m.role.to_string(),
            content: m.content,
        })
        .collect();
    Json(messages)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    session_id: Option<String>,
}

/// Chat form submission.
#[derive(Debug, Deserialize)]
struct ChatForm {
    session_id: String,
    message: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    temperature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewChatForm {
    #[serde(default)]
    session_id: Option<String>,
}

/// Everything the page template needs.
struct PageView<'a> {
    session_id: &'a str,
    history: &'a [Message],
    system_prompt: &'a str,
    temperature: f32,
    error: Option<&'a str>,
}

/// GET / - Chat page. Without a session ID a fresh one is minted; the session
/// itself is only registered on its first turn.
async fn index_handler(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Html<String> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let history = state.orchestrator.history(&session_id);

    Html(render_page(&PageView {
        session_id: &session_id,
        history: &history,
        system_prompt: &state.config.chat.system_prompt,
        temperature: state.config.llm.temperature,
        error: None,
    }))
}

/// POST /chat - Run a turn from the HTML form and re-render the page.
async fn page_chat(State(state): State<AppState>, Form(form): Form<ChatForm>) -> Html<String> {
    let temperature = match form.temperature.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f32>()
            .map(Some)
            .map_err(|e| ChatError::InvalidInput(format!("temperature {raw:?}: {e}"))),
    };

    let outcome = match temperature
        .and_then(|t| turn_settings(&state.config, form.system_prompt.clone(), t))
    {
        Ok((system_prompt, temperature)) if !form.message.trim().is_empty() => state
            .orchestrator
            .turn(
                &form.session_id,
                &system_prompt,
                &form.message,
                &state.api_key,
                temperature,
            )
            .await
            .map(|_| (system_prompt, temperature))
            .map_err(ChatError::from),
        Ok(settings) => Ok(settings),
        Err(e) => Err(e),
    };

    let history = state.orchestrator.history(&form.session_id);
    let fallback_prompt = form
        .system_prompt
        .clone()
        .unwrap_or_else(|| state.config.chat.system_prompt.clone());
    let (system_prompt, temperature, error) = match &outcome {
        Ok((prompt, t)) => (prompt.as_str(), *t, None),
        Err(e) => (fallback_prompt.as_str(), state.config.llm.temperature, Some(e.to_string())),
    };

    Html(render_page(&PageView {
        session_id: &form.session_id,
        history: &history,
        system_prompt,
        temperature,
        error: error.as_deref(),
    }))
}

/// POST /new - Drop the current session and redirect to a fresh one.
async fn page_new_chat(State(state): State<AppState>, Form(form): Form<NewChatForm>) -> Redirect {
    let session_id = state.orchestrator.new_chat(form.session_id.as_deref());
    Redirect::to(&format!("/?session_id={session_id}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the chat page. System messages are internal and never shown.
fn render_page(view: &PageView<'_>) -> String {
    let session_id = escape_html(view.session_id);
    let system_prompt = escape_html(view.system_prompt);
    let temperature = view.temperature;

    let messages: String = view
        .history
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .map(|m| {
            format!(
                r#"<div class="message {role}"><strong>{role}</strong><p>{content}</p></div>"#,
                role = m.role,
                content = escape_html(&m.content)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let error = view
        .error
        .map(|e| format!(r#"<div class="error" role="alert">{}</div>"#, escape_html(e)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Chat</title>
    <style>
        body {{ font-family: sans-serif; display: flex; gap: 2rem; max-width: 64rem; margin: 2rem auto; }}
        aside {{ width: 18rem; }}
        main {{ flex: 1; }}
        .message {{ padding: 0.5rem 1rem; margin: 0.5rem 0; border-radius: 0.5rem; }}
        .user {{ background: #eef; }}
        .assistant {{ background: #efe; }}
        .error {{ background: #fee; padding: 0.5rem 1rem; }}
        textarea {{ width: 100%; }}
    </style>
</head>
<body>
    <aside>
        <h2>Conversation</h2>
        <form method="post" action="/new">
            <input type="hidden" name="session_id" value="{session_id}">
            <button type="submit">New chat</button>
        </form>
    </aside>
    <main>
        <h1>Chat</h1>
        <section id="history">
{messages}
        </section>
        {error}
        <form method="post" action="/chat">
            <input type="hidden" name="session_id" value="{session_id}">
            <label>System prompt
                <textarea name="system_prompt" rows="4">{system_prompt}</textarea>
            </label>
            <label>Temperature
                <input type="number" name="temperature" min="0" max="2" step="0.1" value="{temperature}">
            </label>
            <textarea name="message" rows="3" placeholder="Type your message..." required></textarea>
            <button type="submit">Send</button>
        </form>
    </main>
</body>
</html>"#
    )
}
