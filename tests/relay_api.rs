use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::{Arc, Mutex};

use chat_relay::config::{RelayConfig, TurnLimits};
use chat_relay::history::Role;
use chat_relay::relay::{ByteStream, ChatBackend, ChatCompletionRequest};
use chat_relay::safety::{HumanVerifier, SessionGate};
use chat_relay::server::{router, AppState};

/// Backend that replays canned chunks and remembers what it was asked
#[derive(Default)]
struct ScriptedBackend {
    chunks: Vec<&'static str>,
    fail_mid_stream: bool,
    refuse: bool,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    fn replying(chunks: Vec<&'static str>) -> Self {
        Self {
            chunks,
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());
        if self.refuse {
            return Err(anyhow!("connection refused"));
        }

        let mut chunks: Vec<Result<Bytes>> = self
            .chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        if self.fail_mid_stream {
            chunks.push(Err(anyhow!("connection reset")));
        }
        Ok(stream::iter(chunks).boxed())
    }
}

struct TokenVerifier;

#[async_trait]
impl HumanVerifier for TokenVerifier {
    async fn verify(&self, token: &str, _remote_ip: Option<&str>) -> Result<bool> {
        Ok(token == "human")
    }
}

fn server_with(backend: Arc<ScriptedBackend>, config: &RelayConfig) -> TestServer {
    let state = AppState::new(config, backend);
    TestServer::new(router(state, None)).unwrap()
}

fn data_lines(body: &str) -> Vec<&str> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .collect()
}

#[tokio::test]
async fn test_chat_streams_each_record_then_done() {
    let backend = Arc::new(ScriptedBackend::replying(vec![
        "{\"message\":{\"thinking\":\"hm\"}}\n{\"mess",
        "age\":{\"content\":\"Hi\"}}\n",
        "{\"done\":true}\n",
    ]));
    let server = server_with(backend.clone(), &RelayConfig::default());

    let response = server
        .post("/api/chat")
        .json(&json!({ "message": "hello", "history": [] }))
        .await;

    response.assert_status_ok();
    let content_type = response.header(header::CONTENT_TYPE);
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));

    let body = response.text();
    assert_eq!(
        data_lines(&body),
        vec![
            "{\"message\":{\"thinking\":\"hm\"}}",
            "{\"message\":{\"content\":\"Hi\"}}",
            "{\"done\":true}",
            "[DONE]",
        ]
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].stream);
    assert_eq!(requests[0].model, "deepseek-r1:8b");
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].role, Role::User);
    assert_eq!(requests[0].messages[0].content, "hello");
}

#[tokio::test]
async fn test_missing_message_is_rejected_before_backend() {
    let backend = Arc::new(ScriptedBackend::replying(vec![]));
    let server = server_with(backend.clone(), &RelayConfig::default());

    for body in [json!({ "history": [] }), json!({ "message": "   " })] {
        let response = server.post("/api/chat").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["error"], "Message is required");
    }

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_body_gets_json_error() {
    let backend = Arc::new(ScriptedBackend::replying(vec![]));
    let server = server_with(backend.clone(), &RelayConfig::default());

    for body in [
        json!({ "message": 5 }),
        json!({ "message": "hi", "history": [{ "role": "system", "content": "x" }] }),
    ] {
        let response = server.post("/api/chat").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert!(error["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    let response = server.post("/api/chat").text("{not json").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: serde_json::Value = response.json();
    assert!(error["error"].is_string());

    let response = server.post("/api/verify").json(&json!({ "token": 1 })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: serde_json::Value = response.json();
    assert!(error["error"].is_string());

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_history_is_bounded_and_truncated() {
    let backend = Arc::new(ScriptedBackend::replying(vec!["{\"message\":{\"content\":\"ok\"}}\n"]));
    let config = RelayConfig {
        limits: TurnLimits {
            max_history: 4,
            max_message_chars: 10,
        },
        ..RelayConfig::default()
    };
    let server = server_with(backend.clone(), &config);

    let history: Vec<_> = (0..9)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            json!({ "role": role, "content": format!("turn {} with a long tail", i) })
        })
        .collect();

    server
        .post("/api/chat")
        .json(&json!({ "message": "a very long final message", "history": history }))
        .await
        .assert_status_ok();

    let sent = &backend.requests()[0].messages;
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[0].content, "turn 5 wit");
    assert_eq!(sent[3].content, "turn 8 wit");
    assert_eq!(sent[4].role, Role::User);
    assert_eq!(sent[4].content, "a very lon");
    assert!(sent.iter().all(|t| t.content.chars().count() <= 10));
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let backend = Arc::new(ScriptedBackend {
        refuse: true,
        ..Default::default()
    });
    let server = server_with(backend, &RelayConfig::default());

    let response = server.post("/api/chat").json(&json!({ "message": "hi" })).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: serde_json::Value = response.json();
    assert!(error["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_mid_stream_failure_ends_with_error_event() {
    let backend = Arc::new(ScriptedBackend {
        chunks: vec!["{\"message\":{\"content\":\"par\"}}\n"],
        fail_mid_stream: true,
        ..Default::default()
    });
    let server = server_with(backend, &RelayConfig::default());

    let response = server.post("/api/chat").json(&json!({ "message": "hi" })).await;

    // Headers were already sent; the failure travels in-band.
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("event: error"));
    assert!(body.contains("connection reset"));
    assert!(!data_lines(&body).contains(&"[DONE]"));
}

#[tokio::test]
async fn test_bot_user_agent_is_refused() {
    let backend = Arc::new(ScriptedBackend::replying(vec![]));
    let server = server_with(backend.clone(), &RelayConfig::default());

    let response = server
        .post("/api/chat")
        .add_header(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (compatible; Googlebot/2.1)"),
        )
        .json(&json!({ "message": "hi" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_bot_screening_can_be_disabled() {
    let backend = Arc::new(ScriptedBackend::replying(vec![]));
    let config = RelayConfig {
        block_bots: false,
        ..RelayConfig::default()
    };
    let server = server_with(backend, &config);

    server
        .post("/api/chat")
        .add_header(header::USER_AGENT, HeaderValue::from_static("curl/8.4.0"))
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_verification_gate_admits_after_challenge() {
    let backend = Arc::new(ScriptedBackend::replying(vec!["{\"message\":{\"content\":\"ok\"}}\n"]));
    let state = AppState::new(&RelayConfig::default(), backend.clone())
        .with_gate(SessionGate::new(Arc::new(TokenVerifier)));
    let server = TestServer::new(router(state, None)).unwrap();

    server
        .post("/api/chat")
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/verify")
        .json(&json!({ "token": "robot" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let verified = server.post("/api/verify").json(&json!({ "token": "human" })).await;
    verified.assert_status_ok();
    let sid = verified.cookie("sid");

    server
        .post("/api/chat")
        .add_cookie(sid)
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status_ok();

    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_static_fallback_serves_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>chat</h1>").unwrap();

    let state = AppState::new(&RelayConfig::default(), Arc::new(ScriptedBackend::default()));
    let server = TestServer::new(router(state, Some(dir.path()))).unwrap();

    let response = server.get("/").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "<h1>chat</h1>");
}
