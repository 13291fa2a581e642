//! Chat server fixtures for integration tests.

#![allow(dead_code)]

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Load fixture templates at compile time
pub const CHAT_COMPLETIONS_TEXT: &str = include_str!("fixtures/chat_completions_text.stream");
pub const OLLAMA_TEXT: &str = include_str!("fixtures/ollama_text.stream");

/// A chat-completions stream carrying `text` in one frame.
pub fn text_stream(text: &str) -> String {
    CHAT_COMPLETIONS_TEXT.replace("{{TEXT}}", &escape_json(text))
}

/// A native Ollama stream carrying `text` in one frame.
pub fn ollama_stream(text: &str) -> String {
    OLLAMA_TEXT.replace("{{TEXT}}", &escape_json(text))
}

/// Wrap a stream body in a ResponseTemplate.
pub fn stream_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

/// Convenience: text stream wrapped in ResponseTemplate.
pub fn text_response(text: &str) -> ResponseTemplate {
    stream_response(&text_stream(text))
}

fn json(value: &serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(value)
}

/// Mounts `/config`, `/list` and a logged-in session.
pub async fn mount_server_basics(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(json(&serde_json::json!({
            "default_model": "llama3",
            "tools_callback": {"python": true},
            "use_mathjax": false,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(json(&serde_json::json!({"model_names": ["llama3", "mistral"]})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/is-logged-in"))
        .respond_with(json(&serde_json::json!({"error": false, "message": "You are logged in"})))
        .mount(server)
        .await;
}

/// Mounts dialog creation returning `id` and message persistence for it.
pub async fn mount_dialog(server: &MockServer, id: &str, expected_messages: u64) {
    Mock::given(method("POST"))
        .and(path("/chat/create-dialog"))
        .respond_with(json(&serde_json::json!({"error": false, "dialog_id": id})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/chat/create-message/{id}")))
        .respond_with(json(&serde_json::json!({"error": false, "message_id": 1})))
        .expect(expected_messages)
        .mount(server)
        .await;
}

/// Escape special characters for JSON string embedding.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}
