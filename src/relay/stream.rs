use axum::response::sse::{Event, Sse};
use futures_util::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use super::backend::ByteStream;
use super::lines::LineAssembler;
use crate::services::{AuditEntry, AuditLog, TurnOutcome};

/// Data of the final event of a successful turn
pub const DONE_SENTINEL: &str = "[DONE]";
/// Event name of a mid-stream failure
pub const ERROR_EVENT: &str = "error";

pub type EventStream = UnboundedReceiverStream<Result<Event, Infallible>>;

/// One unit of relay output, before SSE framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// A complete backend record, verbatim
    Line(String),
    /// Terminal sentinel after the last record
    Done,
    /// Terminal failure; no `Done` follows
    Failed(String),
}

impl RelayFrame {
    pub fn into_event(self) -> Event {
        match self {
            // SSE fields cannot carry a bare carriage return
            RelayFrame::Line(line) if line.contains('\r') => {
                Event::default().data(line.replace('\r', ""))
            }
            RelayFrame::Line(line) => Event::default().data(line),
            RelayFrame::Done => Event::default().data(DONE_SENTINEL),
            RelayFrame::Failed(message) => Event::default()
                .event(ERROR_EVENT)
                .data(serde_json::json!({ "error": message }).to_string()),
        }
    }
}

/// Re-frame `upstream` line by line through `emit`, in backend order.
///
/// `emit` returns `false` once the caller has gone away, which stops the
/// upstream read. Returns how the turn ended and how many records were
/// relayed.
pub async fn pump<F>(mut upstream: ByteStream, mut emit: F) -> (TurnOutcome, usize)
where
    F: FnMut(RelayFrame) -> bool,
{
    let mut assembler = LineAssembler::new();
    let mut relayed = 0;

    while let Some(chunk) = upstream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Upstream stream failed after {} records: {:#}", relayed, e);
                emit(RelayFrame::Failed(format!("Inference backend unavailable: {:#}", e)));
                return (TurnOutcome::BackendFailed, relayed);
            }
        };

        for line in assembler.push(&bytes) {
            if !emit(RelayFrame::Line(line)) {
                debug!("Client disconnected after {} records", relayed);
                return (TurnOutcome::ClientDisconnected, relayed);
            }
            relayed += 1;
        }
    }

    if let Some(tail) = assembler.finish() {
        if !emit(RelayFrame::Line(tail)) {
            return (TurnOutcome::ClientDisconnected, relayed);
        }
        relayed += 1;
    }

    if !emit(RelayFrame::Done) {
        return (TurnOutcome::ClientDisconnected, relayed);
    }
    (TurnOutcome::Completed, relayed)
}

/// Spawn the relay task for one turn and return its SSE response.
///
/// The audit entry is completed with the outcome and recorded once the
/// stream has ended, after the last event was queued.
pub fn relay_turn(upstream: ByteStream, audit: AuditLog, mut entry: AuditEntry) -> Sse<EventStream> {
    let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();

    tokio::spawn(async move {
        let (outcome, relayed) = pump(upstream, |frame| tx.send(Ok(frame.into_event())).is_ok()).await;
        drop(tx);

        entry.outcome = outcome;
        entry.relayed_lines = relayed;
        audit.record(entry);
    });

    Sse::new(UnboundedReceiverStream::new(rx))
}
