use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod fixtures;

use fixtures::{mount_dialog, mount_server_basics, stream_response, text_response};

#[tokio::test]
async fn test_chat_streams_reply_and_exits_on_quit() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d1", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({
            "model": "llama3",
            "messages": [{"role": "user", "content": "Hello"}],
        })))
        .respond_with(text_response("Hi there"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .args(["chat"])
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("you> Hello"))
        .stdout(predicate::str::contains("assistant> Hi there"))
        .stdout(predicate::str::contains("Goodbye!"))
        .stderr(predicate::str::contains("/chat/d1"));
}

#[tokio::test]
async fn test_chat_is_the_default_command() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin(":q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("(llama3)"))
        .stdout(predicate::str::contains(":q to quit"));
}

#[tokio::test]
async fn test_chat_skips_empty_lines() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d2", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(text_response("Got it!"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin("\n   \ntest\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Got it!"));
}

#[tokio::test]
async fn test_chat_logged_out_shows_login_hint() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/is-logged-in"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"error": true, "redirect": "/user/login"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .args(["chat", "--model", "llama3"])
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Not logged in"))
        .stderr(predicate::str::contains(format!("{}/user/login", server.uri())));
}

#[tokio::test]
async fn test_chat_server_error_is_reported_and_loop_continues() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d3", 1).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Error: An error occurred. Please try again.",
        ))
        .stdout(predicate::str::contains("Goodbye!"));
}

#[tokio::test]
async fn test_chat_stream_error_frame_shows_stream_notice() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d4", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(stream_response(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Partial\"}}]}\n\n",
            "{\"error\": \"model crashed\"}",
        )))
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("assistant> Partial"))
        .stderr(predicate::str::contains(
            "An error occurred while processing the stream.",
        ));
}

#[tokio::test]
async fn test_chat_model_flag_is_sent_and_remembered() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d5", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(serde_json::json!({"model": "mistral"})))
        .respond_with(text_response("Bonjour"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .args(["chat", "--model", "mistral"])
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bonjour"));

    let state = fs::read_to_string(home.path().join("state.toml")).unwrap();
    assert!(state.contains("mistral"));
}

#[tokio::test]
async fn test_chat_restores_remembered_model() {
    let home = tempdir().unwrap();
    fs::write(home.path().join("state.toml"), "selected_model = \"mistral\"\n").unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin(":q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("(mistral)"));
}

#[tokio::test]
async fn test_chat_without_any_model_fails() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin(":q\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No model available"));
}

#[tokio::test]
async fn test_chat_copy_and_run_code_blocks() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d6", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(text_response("Try this:\n\n```python\nprint(6 * 7)\n```\n"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tools/python"))
        .and(body_json(serde_json::json!({"text": "print(6 * 7)\n"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "42"})))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin("Show me\n:copy 1\n:run 1\n:copy 2\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("print(6 * 7)"))
        .stdout(predicate::str::contains("output>\n42"))
        .stderr(predicate::str::contains("1 code block"))
        .stderr(predicate::str::contains("No code block 2"));
}

#[tokio::test]
async fn test_chat_continues_saved_dialog() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    Mock::given(method("GET"))
        .and(path("/chat/get-messages/d7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"role": "user", "content": "Earlier question"},
            {"role": "assistant", "content": "Earlier answer"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/create-dialog"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/create-message/d7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"error": false, "message_id": 3})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "user", "content": "Earlier question"},
                {"role": "assistant", "content": "Earlier answer"},
                {"role": "user", "content": "Follow up"},
            ],
        })))
        .respond_with(text_response("Later answer"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .args(["chat", "--dialog", &format!("{}/chat/d7", server.uri())])
        .write_stdin("Follow up\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("assistant> Earlier answer"))
        .stdout(predicate::str::contains("assistant> Later answer"));
}

#[tokio::test]
async fn test_chat_copy_without_number_prints_last_reply() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d8", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(text_response("Copy me please"))
        .mount(&server)
        .await;

    let assert = cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin(":copy\nHello\n:copy\n:q\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("No reply to copy yet."));

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert_eq!(stdout.matches("Copy me please").count(), 2);
}

#[tokio::test]
async fn test_chat_shows_thinking_markers_not_tags() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    mount_server_basics(&server).await;
    mount_dialog(&server, "d9", 2).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(text_response("<think>plan</think>answer"))
        .mount(&server)
        .await;

    cargo_bin_cmd!("ochat")
        .env("OCHAT_HOME", home.path())
        .env("OCHAT_BASE_URL", server.uri())
        .write_stdin("Hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "assistant> **Think begin**plan**Think end**answer",
        ))
        .stdout(predicate::str::contains("<think>").not());
}
