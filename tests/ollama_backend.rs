use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_relay::history::Turn;
use chat_relay::relay::{ChatBackend, ChatCompletionRequest, OllamaBackend};

fn request(think: Option<bool>) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: "deepseek-r1:8b".to_string(),
        messages: vec![Turn::user("Why is the sky blue?")],
        stream: true,
        think,
    }
}

#[tokio::test]
async fn test_posts_streaming_chat_request() {
    let server = MockServer::start().await;
    let ndjson = "{\"message\":{\"role\":\"assistant\",\"content\":\"Ray\"},\"done\":false}\n\
                  {\"message\":{\"role\":\"assistant\",\"content\":\"leigh\"},\"done\":true}\n";

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "deepseek-r1:8b",
            "stream": true,
            "messages": [{ "role": "user", "content": "Why is the sky blue?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson))
        .expect(1)
        .mount(&server)
        .await;

    // trailing slash is tolerated
    let backend = OllamaBackend::new(format!("{}/", server.uri())).unwrap();
    let mut body = backend.stream_chat(&request(None)).await.unwrap();

    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        raw.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(String::from_utf8(raw).unwrap(), ndjson);
}

#[tokio::test]
async fn test_think_flag_is_forwarded_when_set() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "think": true })))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(server.uri()).unwrap();
    assert!(backend.stream_chat(&request(Some(true))).await.is_ok());
}

#[tokio::test]
async fn test_error_status_carries_backend_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'deepseek-r1:8b' not found" })),
        )
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(server.uri()).unwrap();
    let err = match backend.stream_chat(&request(None)).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => format!("{:#}", e),
    };

    assert!(err.contains("404"));
    assert!(err.contains("model 'deepseek-r1:8b' not found"));
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    // Nothing listens on the discard port
    let backend = OllamaBackend::new("http://127.0.0.1:9").unwrap();
    assert!(backend.stream_chat(&request(None)).await.is_err());
}
