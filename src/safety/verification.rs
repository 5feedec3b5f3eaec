//! Human verification gate
//!
//! A session must pass one verification challenge before the chat API
//! accepts it. The challenge itself is delegated to a [`HumanVerifier`];
//! passing sessions are remembered in memory under a random session id
//! carried in the `sid` cookie.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::VerificationConfig;

pub const SESSION_COOKIE: &str = "sid";

/// How long a verified session stays admitted
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Checks a client-supplied challenge token.
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool>;
}

/// `siteverify`-style verifier: form POST of `secret`, `response` and
/// `remoteip`, answered with `{"success": bool}`.
pub struct SiteVerifier {
    client: Client,
    config: VerificationConfig,
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl SiteVerifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl HumanVerifier for SiteVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool> {
        let mut form = vec![
            ("secret", self.config.secret.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let res: SiteVerifyResponse = self
            .client
            .post(&self.config.url)
            .form(&form)
            .send()
            .await
            .context("Failed to reach verification service")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse verification response")?;

        if !res.success {
            debug!("Verification rejected: {:?}", res.error_codes);
        }
        Ok(res.success)
    }
}

/// Verified session registry
///
/// Sessions expire after a fixed lifetime; expired ids are swept whenever a
/// new one is issued, so the registry stays bounded by the issue rate.
#[derive(Clone)]
pub struct SessionGate {
    verifier: Option<Arc<dyn HumanVerifier>>,
    verified: Arc<RwLock<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl SessionGate {
    /// A gate that lets every request through.
    pub fn open() -> Self {
        Self {
            verifier: None,
            verified: Arc::default(),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn new(verifier: Arc<dyn HumanVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
            verified: Arc::default(),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Whether a request carrying `session_id` may use the chat API.
    pub fn admits(&self, session_id: Option<&str>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let Some(id) = session_id else {
            return false;
        };
        let issued = match self.verified.read() {
            Ok(verified) => verified.get(id).copied(),
            Err(poisoned) => poisoned.into_inner().get(id).copied(),
        };
        issued.is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Number of sessions currently remembered, expired or not.
    pub fn session_count(&self) -> usize {
        match self.verified.read() {
            Ok(verified) => verified.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Run the challenge; on success returns the new session id to hand out.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<Option<String>> {
        let Some(verifier) = &self.verifier else {
            return Ok(Some(Uuid::new_v4().to_string()));
        };

        if !verifier.verify(token, remote_ip).await? {
            warn!("Human verification failed for {}", remote_ip.unwrap_or("unknown client"));
            return Ok(None);
        }

        let id = Uuid::new_v4().to_string();
        let mut verified = match self.verified.write() {
            Ok(verified) => verified,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = verified.len();
        verified.retain(|_, issued| issued.elapsed() < self.ttl);
        if verified.len() < before {
            debug!("Expired {} verified sessions", before - verified.len());
        }
        verified.insert(id.clone(), Instant::now());
        Ok(Some(id))
    }
}
