use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::history::Turn;

/// Raw response body of a streaming chat request, chunked however the
/// transport delivers it.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Body of one upstream chat request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
}

/// An inference server that answers a chat request with a byte stream of
/// newline-delimited JSON records.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Resolves only once the backend has accepted the request; an `Err` here
    /// means nothing was streamed.
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> Result<ByteStream>;
}

pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> Result<ByteStream> {
        let url = self.chat_url();

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Ollama returned {}: {}", status, error_detail(&body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.context("Ollama stream interrupted"))
            .boxed())
    }
}

/// Ollama reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
