//! Upstream Relay
//!
//! Forwards one chat turn to the inference backend and re-frames the
//! backend's newline-delimited JSON body as server-sent events, one event
//! per complete record, followed by a `[DONE]` sentinel.

pub mod backend;
mod error;
pub mod lines;
pub mod stream;

pub use backend::{ByteStream, ChatBackend, ChatCompletionRequest, OllamaBackend};
pub use error::RelayError;
pub use lines::LineAssembler;
pub use stream::{pump, relay_turn, RelayFrame, DONE_SENTINEL, ERROR_EVENT};
