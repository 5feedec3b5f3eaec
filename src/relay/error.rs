use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failures the relay reports to its caller before any event is streamed
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Message is required")]
    MissingMessage,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Human verification required")]
    VerificationRequired,

    #[error("Human verification failed")]
    VerificationFailed,

    #[error("Automated clients are not allowed")]
    AutomatedClient,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingMessage | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            RelayError::VerificationRequired
            | RelayError::VerificationFailed
            | RelayError::AutomatedClient => StatusCode::FORBIDDEN,
        }
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
