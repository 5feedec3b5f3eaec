//! Chat Relay server
//!
//! Serves the chat page and proxies `/api/chat` to Ollama, streaming the
//! reply back as it is generated.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use chat_relay::config::RelayConfig;
use chat_relay::relay::OllamaBackend;
use chat_relay::safety::{SessionGate, SiteVerifier};
use chat_relay::server::{run_server, AppState};
use chat_relay::services::AuditLog;
use chat_relay::utils::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    init_tracing();

    let config = RelayConfig::from_env()?;
    let backend = Arc::new(OllamaBackend::new(config.ollama_url.clone())?);

    // The guard flushes buffered audit lines on shutdown
    let (audit, _audit_guard) = match &config.audit_dir {
        Some(dir) => {
            let (log, guard) = AuditLog::in_dir(dir)?;
            info!("📝 Audit log: {}", dir.display());
            (log, Some(guard))
        }
        None => {
            warn!("Audit log disabled");
            (AuditLog::disabled(), None)
        }
    };

    let gate = match config.verification.clone() {
        Some(verification) => {
            info!("🔒 Human verification required for /api/chat");
            SessionGate::new(Arc::new(SiteVerifier::new(verification)))
        }
        None => SessionGate::open(),
    };

    if !config.static_dir.is_dir() {
        warn!("Static directory {} not found", config.static_dir.display());
    }

    let state = AppState::new(&config, backend)
        .with_audit(audit)
        .with_gate(gate);

    run_server(state, &config).await
}
