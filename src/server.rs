use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Json, Request, State},
    http::{header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::{RelayConfig, TurnLimits};
use crate::history::{bounded_turns, Turn};
use crate::relay::{relay_turn, ChatBackend, ChatCompletionRequest, RelayError};
use crate::safety::{SessionGate, UserAgentFilter, SESSION_COOKIE};
use crate::services::{AuditEntry, AuditLog, TurnOutcome};
use crate::utils::preview;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ChatBackend>,
    pub model: String,
    pub think: Option<bool>,
    pub limits: TurnLimits,
    pub audit: AuditLog,
    pub audit_message_chars: usize,
    pub user_agents: Arc<UserAgentFilter>,
    pub block_bots: bool,
    pub gate: SessionGate,
}

impl AppState {
    /// State with auditing off and an open gate; see [`AppState::with_audit`]
    /// and [`AppState::with_gate`].
    pub fn new(config: &RelayConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            think: config.think,
            limits: config.limits,
            audit: AuditLog::disabled(),
            audit_message_chars: config.audit_message_chars,
            user_agents: Arc::new(UserAgentFilter::new()),
            block_bots: config.block_bots,
            gate: SessionGate::open(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_gate(mut self, gate: SessionGate) -> Self {
        self.gate = gate;
        self
    }
}

/// Inbound chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    token: String,
}

/// JSON request body whose rejections are reported as [`RelayError`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(RelayError))]
struct JsonBody<T>(T);

/// Caller address and user agent
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let forwarded = header_str("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty());

        let ip = forwarded.or_else(|| header_str("x-real-ip")).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(Self {
            ip,
            user_agent: header_str(header::USER_AGENT.as_str()),
        })
    }
}

/// API router; static assets are served from `static_dir` for every other path.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/verify", post(verify))
        .route_layer(middleware::from_fn_with_state(state.clone(), screen_clients))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
}

pub async fn run_server(state: AppState, config: &RelayConfig) -> Result<()> {
    let app = router(state, Some(&config.static_dir));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!("🚀 Relay ready: http://{}", config.bind_addr);
    info!("📡 Proxying to Ollama at {} ({})", config.ollama_url, config.model);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server terminated")?;

    Ok(())
}

async fn screen_clients(
    State(state): State<AppState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Response {
    if state.block_bots {
        if let Some(ua) = client.user_agent.as_deref() {
            if state.user_agents.is_bot(ua) {
                info!("Rejected automated client {:?}: {}", client.ip, ua);
                return RelayError::AutomatedClient.into_response();
            }
        }
    }
    next.run(request).await
}

async fn chat(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Response, RelayError> {
    if !state.gate.admits(jar.get(SESSION_COOKIE).map(Cookie::value)) {
        return Err(RelayError::VerificationRequired);
    }

    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(RelayError::MissingMessage)?;

    let request = ChatCompletionRequest {
        model: state.model.clone(),
        messages: bounded_turns(&message, req.history, &state.limits),
        stream: true,
        think: state.think,
    };
    info!(turns = request.messages.len(), model = %request.model, "Relaying chat turn");

    let upstream = state.backend.stream_chat(&request).await.map_err(|e| {
        error!("Backend rejected chat turn: {:#}", e);
        RelayError::BackendUnavailable(format!("{:#}", e))
    })?;

    let entry = AuditEntry {
        timestamp: Utc::now(),
        ip: client.ip.clone().unwrap_or_else(|| "unknown".to_string()),
        device: state.user_agents.classify(client.user_agent.as_deref()),
        message: preview(&message, state.audit_message_chars),
        outcome: TurnOutcome::Completed,
        forwarded_turns: request.messages.len(),
        relayed_lines: 0,
        telemetry: None,
    };

    Ok(relay_turn(upstream, state.audit.clone(), entry).into_response())
}

async fn verify(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    JsonBody(req): JsonBody<VerifyRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), RelayError> {
    let session_id = state
        .gate
        .verify(&req.token, client.ip.as_deref())
        .await
        .map_err(|e| {
            warn!("Verification service error: {:#}", e);
            RelayError::VerificationFailed
        })?
        .ok_or(RelayError::VerificationFailed)?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict);

    Ok((jar.add(cookie), Json(serde_json::json!({ "verified": true }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, routing::get};
    use tower::ServiceExt;

    async fn echo_client(client: ClientInfo) -> String {
        format!(
            "{}|{}",
            client.ip.unwrap_or_default(),
            client.user_agent.unwrap_or_default()
        )
    }

    async fn call(headers: &[(&str, &str)]) -> String {
        let mut request = http::Request::builder().uri("/");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = Router::new()
            .route("/", get(echo_client))
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_for_takes_first_hop() {
        let seen = call(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.1"),
            ("user-agent", "Firefox"),
        ])
        .await;
        assert_eq!(seen, "203.0.113.7|Firefox");
    }

    #[tokio::test]
    async fn test_real_ip_fallback() {
        assert_eq!(call(&[("x-real-ip", "198.51.100.2")]).await, "198.51.100.2|");
    }

    #[tokio::test]
    async fn test_no_address_known() {
        assert_eq!(call(&[]).await, "|");
    }
}
