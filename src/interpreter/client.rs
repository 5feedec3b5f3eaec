use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;

use super::ClientError;
use crate::history::Turn;
use crate::relay::{LineAssembler, DONE_SENTINEL, ERROR_EVENT};

/// One decoded server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.event.is_none() && self.data == DONE_SENTINEL
    }

    pub fn is_error(&self) -> bool {
        self.event.as_deref() == Some(ERROR_EVENT)
    }
}

pub type EventStream = BoxStream<'static, Result<SseEvent, ClientError>>;

/// Incremental `text/event-stream` decoder
#[derive(Debug)]
pub struct SseDecoder {
    lines: LineAssembler,
    event: Option<String>,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            lines: LineAssembler::keeping_blank_lines(),
            event: None,
            data: Vec::new(),
        }
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| self.feed_line(&line))
            .collect()
    }

    /// Dispatch an event left unterminated at end of stream.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if let Some(line) = self.lines.finish() {
            if let Some(event) = self.feed_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Where a session sends its turns.
#[async_trait]
pub trait TurnSource: Send + Sync {
    /// Submit `message` with the prior `history`; the stream yields the
    /// relay's events in arrival order.
    async fn open_turn(&self, message: &str, history: &[Turn]) -> Result<EventStream, ClientError>;
}

/// HTTP client for a running relay
///
/// Keeps the relay's session cookie, so after one successful
/// [`RelayClient::verify`] a relay with human verification turned on
/// accepts the client's turns.
pub struct RelayClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    history: &'a [Turn],
}

#[derive(Serialize)]
struct VerifyPayload<'a> {
    token: &'a str,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Pass the relay's human verification challenge with `token`.
    pub async fn verify(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/api/verify"))
            .json(&VerifyPayload { token })
            .send()
            .await?;
        rejection(response).await.map(|_| ())
    }
}

/// Map a non-success response to [`ClientError::Rejected`] carrying the
/// relay's `error` text.
async fn rejection(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TurnSource for RelayClient {
    async fn open_turn(&self, message: &str, history: &[Turn]) -> Result<EventStream, ClientError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&ChatPayload { message, history })
            .send()
            .await?;
        let response = rejection(response).await?;

        Ok(decode_events(response.bytes_stream().boxed()))
    }
}

struct EventReader {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
    ended: bool,
}

fn decode_events(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> EventStream {
    let reader = EventReader {
        bytes,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        ended: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(event) = reader.ready.pop_front() {
                return Some((Ok(event), reader));
            }
            if reader.ended {
                return None;
            }
            match reader.bytes.next().await {
                Some(Ok(chunk)) => reader.ready.extend(reader.decoder.push(&chunk)),
                Some(Err(e)) => {
                    reader.ended = true;
                    return Some((Err(ClientError::Interrupted(e.to_string())), reader));
                }
                None => {
                    reader.ended = true;
                    reader.ready.extend(reader.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
