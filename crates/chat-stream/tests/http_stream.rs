//! End-to-end streaming tests against a mocked chat server.

use std::sync::{Arc, Mutex};

use chat_stream::RETRY_PROMPT;
use chat_stream::prelude::*;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct CollectingSink {
    text: Arc<Mutex<String>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl RenderSink for CollectingSink {
    fn append_text(&mut self, text: &str) {
        self.text.lock().expect("sink lock").push_str(text);
    }

    fn show_error(&mut self, message: &str) {
        self.errors
            .lock()
            .expect("sink lock")
            .push(message.to_string());
    }

    fn show_cancelled(&mut self) {}
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri()).user_id("user_test")
}

fn event_stream(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

#[tokio::test]
async fn streams_reply_and_persists_assistant_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .and(body_partial_json(
            serde_json::json!({ "user_id": "user_test", "title": "What should I cook?" }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "chat_id": "chat-42", "message": "Chat created successfully" }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(serde_json::json!({
            "user_id": "user_test",
            "chat_id": "chat-42",
            "message": "What should I cook?"
        })))
        .respond_with(event_stream(
            "data: {\"content\": \"Try \"}\n\n\
             data: {\"content\": \"lentil soup.\"}\n\n\
             data: {\"type\": \"done\"}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chats/chat-42/messages"))
        .and(body_partial_json(serde_json::json!({
            "user_id": "user_test",
            "role": "assistant",
            "content": "Try lentil soup."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::from_config(config(&server)).expect("client");
    let sink = CollectingSink::default();
    let mut ctx = ChatContext::new("user_test");

    let outcome = client
        .start(&mut ctx, "What should I cook?", sink.clone())
        .await
        .expect("start")
        .wait()
        .await
        .expect("outcome");

    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.chat_id, "chat-42");
    assert_eq!(outcome.text, "Try lentil soup.");
    assert!(outcome.persisted);
    assert_eq!(*sink.text.lock().expect("lock"), "Try lentil soup.");
    assert_eq!(ctx.title(), Some("What should I cook?"));
}

#[tokio::test]
async fn server_error_frame_is_shown_and_not_persisted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(event_stream(
            "data: {\"content\": \"Hel\"}\n\ndata: {\"error\": \"rate limited\"}\n\n",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chats/c1/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatClient::from_config(config(&server)).expect("client");
    let sink = CollectingSink::default();

    let outcome = client
        .start(&mut ChatContext::with_chat("user_test", "c1"), "hi", sink.clone())
        .await
        .expect("start")
        .wait()
        .await
        .expect("outcome");

    assert_eq!(outcome.state, SessionState::Failed);
    assert!(!outcome.persisted);
    assert_eq!(*sink.errors.lock().expect("lock"), vec!["rate limited".to_string()]);
}

#[tokio::test]
async fn error_status_is_a_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = ChatClient::from_config(config(&server)).expect("client");
    let sink = CollectingSink::default();

    let result = client
        .start(&mut ChatContext::with_chat("user_test", "c1"), "hi", sink.clone())
        .await;

    match result {
        Err(StreamError::Network { status_code, .. }) => assert_eq!(status_code, Some(500)),
        Err(other) => panic!("expected network error, got {other:?}"),
        Ok(_) => panic!("expected network error, got a session"),
    }
    assert_eq!(*sink.errors.lock().expect("lock"), vec![RETRY_PROMPT.to_string()]);
}

#[tokio::test]
async fn non_event_stream_body_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": "hi" })))
        .mount(&server)
        .await;

    let client = ChatClient::from_config(config(&server)).expect("client");

    let result = client
        .start(
            &mut ChatContext::with_chat("user_test", "c1"),
            "hi",
            CollectingSink::default(),
        )
        .await;

    assert!(matches!(result, Err(StreamError::Protocol { .. })));
}

#[tokio::test]
async fn unreachable_server_falls_back_to_local_chat_and_fails_to_open() {
    // Exclusive (non-pooled) server so dropping it actually closes the port.
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let client = ChatClient::from_config(ClientConfig::new(uri).user_id("user_test"))
        .expect("client");
    let mut ctx = ChatContext::new("user_test");

    let result = client
        .start(&mut ctx, "hi", CollectingSink::default())
        .await;

    assert!(matches!(result, Err(StreamError::Network { status_code: None, .. })));
    assert!(ctx.chat_id().is_some_and(|id| id.starts_with("new-chat-")));
}
