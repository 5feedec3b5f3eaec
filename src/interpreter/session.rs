use futures_util::StreamExt;
use tracing::{debug, warn};

use super::client::{EventStream, TurnSource};
use super::record::StreamRecord;
use super::state::RenderState;
use super::ClientError;
use crate::history::Turn;

/// The visible conversation a session draws into.
///
/// Calls arrive strictly in order for one turn: `show_user`, `set_busy(true)`,
/// `show_pending`, then either `begin_reply` / `render_reply`… / `end_reply`
/// or a single `show_error`, and finally `set_busy(false)`.
pub trait ChatView {
    fn show_user(&mut self, text: &str);

    /// Input control availability
    fn set_busy(&mut self, busy: bool);

    /// Placeholder while waiting for the relay to answer
    fn show_pending(&mut self) {}

    /// Replace the placeholder with an empty streaming reply
    fn begin_reply(&mut self);

    /// Replace the reply's content; `html` is `state.compose()`.
    fn render_reply(&mut self, state: &RenderState, html: &str);

    /// The reply is complete; drop any streaming marker.
    fn end_reply(&mut self);

    /// An assistant-styled error message. Not part of the history.
    fn show_error(&mut self, message: &str);
}

/// Consume one turn's events, re-rendering after every record.
///
/// Returns the final answer text on `[DONE]` or a clean end of stream.
/// Malformed lines are skipped.
pub async fn interpret_stream<V>(mut events: EventStream, view: &mut V) -> Result<String, ClientError>
where
    V: ChatView + ?Sized,
{
    let mut state = RenderState::new();
    view.begin_reply();

    let mut saw_done = false;
    while let Some(event) = events.next().await {
        let event = event?;

        if event.is_error() {
            let message = serde_json::from_str::<serde_json::Value>(&event.data)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or(event.data);
            return Err(ClientError::BackendUnavailable(message));
        }
        if event.is_done() {
            saw_done = true;
            break;
        }

        let record = match StreamRecord::parse(&event.data) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                debug!("Dropping line: {}", e);
                continue;
            }
        };

        state.apply(record)?;
        view.render_reply(&state, &state.compose());
    }

    if !saw_done {
        warn!("Stream ended without a completion marker");
    }
    if state.finish() {
        view.render_reply(&state, &state.compose());
    }
    view.end_reply();

    Ok(state.into_answer())
}

/// One client's conversation.
///
/// `submit` borrows the session mutably for the whole turn, so a second
/// turn cannot start until the first has finished or been dropped.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Run a full turn: send `message`, stream the reply into `view`, and on
    /// success append the answer to the history.
    ///
    /// Every failure is shown once through [`ChatView::show_error`] and
    /// returned, and the view is made interactive again. If the returned
    /// future is dropped mid-turn the user turn stays in the history and the
    /// session remains usable.
    pub async fn submit<S, V>(&mut self, source: &S, message: &str, view: &mut V) -> Result<(), ClientError>
    where
        S: TurnSource + ?Sized,
        V: ChatView + ?Sized,
    {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        view.show_user(message);
        let prior = self.history.clone();
        self.history.push(Turn::user(message));

        view.set_busy(true);
        view.show_pending();

        let result = match source.open_turn(message, &prior).await {
            Ok(events) => interpret_stream(events, view).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(answer) => {
                self.history.push(Turn::assistant(answer));
                Ok(())
            }
            Err(e) => {
                warn!("Turn failed: {}", e);
                view.show_error(&format!("An error occurred: {}", e));
                Err(e)
            }
        };

        view.set_busy(false);
        outcome
    }
}
