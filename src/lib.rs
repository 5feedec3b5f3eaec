//! Chat Relay
//!
//! A small web chat front end for a local Ollama server:
//! - `/api/chat` forwards a bounded conversation and streams the model's
//!   output back as server-sent events, one NDJSON record per event
//! - the interpreter splits each reply into reasoning and answer text,
//!   whether the model reports them in separate fields or inline `<think>` tags
//! - optional bot screening, human verification and a daily audit log

pub mod config;
pub mod history;
pub mod interpreter;
pub mod relay;
pub mod safety;
pub mod server;
pub mod services;
pub mod utils;

// Re-exports for convenience
pub use config::{ClientConfig, RelayConfig, TurnLimits};
pub use history::{Role, Turn};
pub use interpreter::{ChatSession, ChatView, RelayClient, RenderState};
pub use relay::{ChatBackend, OllamaBackend};
pub use server::{router, run_server, AppState};
