use thiserror::Error;

/// Failures of a client turn. Each one ends the turn.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach the relay: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Message is empty")]
    EmptyMessage,
}
