//! HTTP-level tests for the chat page and JSON API, with a scripted model
//! standing in for the provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use session_chat::config::{AppConfig, ChatConfig, LlmConfig, ServerConfig};
use session_chat::error::UpstreamError;
use session_chat::llm::{ChainCache, ChatModel, Message, ModelBuilder};
use session_chat::server::{build_state, router};

/// Replays queued results; echoes the input once the queue is empty.
#[derive(Clone, Default)]
struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<String, UpstreamError>>>>,
    seen: Arc<Mutex<Vec<(String, f32, Vec<Message>)>>>,
}

struct Bound {
    script: ScriptedModel,
    api_key: String,
    temperature: f32,
}

#[async_trait::async_trait]
impl ChatModel for Bound {
    async fn complete(&self, messages: &[Message]) -> Result<String, UpstreamError> {
        self.script.seen.lock().unwrap().push((
            self.api_key.clone(),
            self.temperature,
            messages.to_vec(),
        ));
        let queued = self.script.replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        })
    }
}

impl ModelBuilder for ScriptedModel {
    fn build(&self, api_key: &str, temperature: f32) -> Arc<dyn ChatModel> {
        Arc::new(Bound {
            script: self.clone(),
            api_key: api_key.to_string(),
            temperature,
        })
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        llm: LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            model: "test/model".to_string(),
            temperature: 0.7,
            timeout_secs: 5,
            app_url: "http://localhost".to_string(),
            app_title: "tests".to_string(),
        },
        chat: ChatConfig {
            system_prompt: "default prompt".to_string(),
        },
    }
}

fn setup() -> (TestServer, ScriptedModel) {
    let model = ScriptedModel::default();
    let state = build_state(
        Arc::new(test_config()),
        "sk-test".to_string(),
        ChainCache::new(model.clone()),
    );
    let server = TestServer::new(router(state)).expect("test server");
    (server, model)
}

#[tokio::test]
async fn test_chat_roundtrip_and_history() {
    let (server, model) = setup();

    let resp = server
        .post("/api/chat")
        .json(&json!({
            "message": "Hello",
            "session_id": "s1",
            "system_prompt": "be terse",
            "temperature": 0.2
        }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["reply"], "echo: Hello");

    let (api_key, temperature, request) = model.seen.lock().unwrap()[0].clone();
    assert_eq!(api_key, "sk-test");
    assert!((temperature - 0.2).abs() < 1e-6);
    assert_eq!(request[0], Message::system("be terse"));

    server
        .post("/api/chat")
        .json(&json!({"message": "How are you?", "session_id": "s1"}))
        .await
        .assert_status_ok();

    let history: Value = server.get("/api/sessions/s1/messages").await.json();
    assert_eq!(
        history,
        json!([
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "echo: Hello"},
            {"role": "user", "content": "How are you?"},
            {"role": "assistant", "content": "echo: How are you?"}
        ])
    );

    // Second turn fell back to the configured prompt and temperature.
    let (_, temperature, request) = model.seen.lock().unwrap()[1].clone();
    assert!((temperature - 0.7).abs() < 1e-6);
    assert_eq!(request[0], Message::system("default prompt"));
    assert_eq!(request.len(), 4);
}

#[tokio::test]
async fn test_chat_without_session_mints_one() {
    let (server, _model) = setup();

    let body: Value = server
        .post("/api/chat")
        .json(&json!({"message": "Hi"}))
        .await
        .json();
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(!session_id.is_empty());

    let history: Value = server
        .get(&format!("/api/sessions/{session_id}/messages"))
        .await
        .json();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let (server, model) = setup();

    let resp = server
        .post("/api/chat")
        .json(&json!({"message": "   ", "session_id": "s1"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_range_temperature_rejected() {
    let (server, _model) = setup();

    let resp = server
        .post("/api/chat")
        .json(&json!({"message": "Hi", "session_id": "s1", "temperature": 5.0}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upstream_throttling_passes_through() {
    let (server, model) = setup();
    server
        .post("/api/chat")
        .json(&json!({"message": "first", "session_id": "s1"}))
        .await
        .assert_status_ok();

    model
        .replies
        .lock()
        .unwrap()
        .push_back(Err(UpstreamError::RateLimited("quota exceeded".to_string())));

    let resp = server
        .post("/api/chat")
        .json(&json!({"message": "second", "session_id": "s1"}))
        .await;
    resp.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = resp.json();
    assert_eq!(body["error"], "Rate limited by provider: quota exceeded");

    let history: Value = server.get("/api/sessions/s1/messages").await.json();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reset_then_turn() {
    let (server, _model) = setup();
    for msg in ["a", "b"] {
        server
            .post("/api/chat")
            .json(&json!({"message": msg, "session_id": "s1"}))
            .await
            .assert_status_ok();
    }

    server
        .post("/api/sessions/s1/reset")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let history: Value = server.get("/api/sessions/s1/messages").await.json();
    assert_eq!(history, json!([]));

    server
        .post("/api/chat")
        .json(&json!({"message": "c", "session_id": "s1"}))
        .await
        .assert_status_ok();
    let history: Value = server.get("/api/sessions/s1/messages").await.json();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_new_session_drops_previous() {
    let (server, _model) = setup();
    server
        .post("/api/chat")
        .json(&json!({"message": "a", "session_id": "old"}))
        .await
        .assert_status_ok();

    let resp = server
        .post("/api/sessions")
        .add_query_param("previous", "old")
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    let fresh = body["session_id"].as_str().unwrap();
    assert_ne!(fresh, "old");

    let old: Value = server.get("/api/sessions/old/messages").await.json();
    assert_eq!(old, json!([]));
}

#[tokio::test]
async fn test_unknown_session_history_is_empty() {
    let (server, _model) = setup();
    let history: Value = server.get("/api/sessions/nobody/messages").await.json();
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_html_form_turn_renders_history() {
    let (server, _model) = setup();

    let page = server.get("/?session_id=page-1").await;
    page.assert_status_ok();
    assert!(page.text().contains(r#"value="page-1""#));

    let resp = server
        .post("/chat")
        .form(&[
            ("session_id", "page-1"),
            ("message", "Hello <there>"),
            ("system_prompt", "be terse"),
            ("temperature", "0.3"),
        ])
        .await;
    resp.assert_status_ok();
    let html = resp.text();
    assert!(html.contains("Hello &lt;there&gt;"));
    assert!(html.contains("echo: Hello &lt;there&gt;"));
    assert!(!html.contains(r#"class="error""#));
}

#[tokio::test]
async fn test_html_form_shows_raw_upstream_error() {
    let (server, model) = setup();
    model
        .replies
        .lock()
        .unwrap()
        .push_back(Err(UpstreamError::Authentication("invalid key".to_string())));

    let resp = server
        .post("/chat")
        .form(&[("session_id", "page-2"), ("message", "Hi")])
        .await;
    let html = resp.text();
    assert!(html.contains("Authentication failed: invalid key"));

    let history: Value = server.get("/api/sessions/page-2/messages").await.json();
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_html_new_chat_redirects() {
    let (server, _model) = setup();
    let resp = server.post("/new").form(&[("session_id", "page-3")]).await;
    resp.assert_status(StatusCode::SEE_OTHER);
    let location = resp.header("location");
    assert!(location.to_str().unwrap().starts_with("/?session_id="));
}

#[tokio::test]
async fn test_health() {
    let (server, _model) = setup();
    server.get("/health").await.assert_text("ok");
}
