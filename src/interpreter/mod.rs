//! Client side of a chat turn
//!
//! Reads the relay's event stream, separates reasoning from the answer and
//! re-renders the reply after every record.

mod client;
mod error;
mod record;
mod render;
mod session;
mod state;
mod tags;
mod terminal;

pub use client::{EventStream, RelayClient, SseDecoder, SseEvent, TurnSource};
pub use error::ClientError;
pub use record::{MalformedRecord, StreamRecord};
pub use render::{compose, markdown_to_html, PENDING_HTML};
pub use session::{interpret_stream, ChatSession, ChatView};
pub use state::RenderState;
pub use tags::{TagScanner, THINK_CLOSE, THINK_OPEN};
pub use terminal::TerminalView;
