//! Configuration
//!
//! Everything is read from `CHAT_RELAY_*` environment variables (a `.env`
//! file is loaded first by the binaries). Unset variables fall back to
//! [`Default`].

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Limits applied to an inbound chat turn before it is forwarded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnLimits {
    /// Most recent history turns kept; older ones are dropped silently.
    pub max_history: usize,
    /// Per-message character cap, applied to history entries and the new message.
    pub max_message_chars: usize,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_history: 20,
            max_message_chars: 8000,
        }
    }
}

/// Human verification endpoint (a `siteverify`-style form POST).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationConfig {
    pub url: String,
    pub secret: String,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    pub model: String,
    /// Forwarded as Ollama's `think` flag when set
    pub think: Option<bool>,
    pub limits: TurnLimits,
    pub static_dir: PathBuf,
    /// Directory for the daily audit log; `None` disables auditing
    pub audit_dir: Option<PathBuf>,
    pub audit_message_chars: usize,
    pub block_bots: bool,
    /// Verification gate; disabled unless both URL and secret are configured
    pub verification: Option<VerificationConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ollama_url: "http://localhost:11434".to_string(),
            model: "deepseek-r1:8b".to_string(),
            think: None,
            limits: TurnLimits::default(),
            static_dir: PathBuf::from("public"),
            audit_dir: Some(PathBuf::from("logs")),
            audit_message_chars: 100,
            block_bots: true,
            verification: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let verification = match (var("CHAT_RELAY_VERIFY_URL"), var("CHAT_RELAY_VERIFY_SECRET")) {
            (Some(url), Some(secret)) => Some(VerificationConfig { url, secret }),
            _ => None,
        };

        let audit_dir = match var("CHAT_RELAY_AUDIT_DIR") {
            Some(dir) if dir.eq_ignore_ascii_case("off") => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => defaults.audit_dir,
        };

        Ok(Self {
            bind_addr: parse_var("CHAT_RELAY_BIND")?.unwrap_or(defaults.bind_addr),
            ollama_url: var("CHAT_RELAY_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: var("CHAT_RELAY_MODEL").unwrap_or(defaults.model),
            think: parse_var("CHAT_RELAY_THINK")?,
            limits: TurnLimits {
                max_history: parse_var("CHAT_RELAY_MAX_HISTORY")?
                    .unwrap_or(defaults.limits.max_history),
                max_message_chars: parse_var("CHAT_RELAY_MAX_MESSAGE_CHARS")?
                    .unwrap_or(defaults.limits.max_message_chars),
            },
            static_dir: var("CHAT_RELAY_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            audit_dir,
            audit_message_chars: parse_var("CHAT_RELAY_AUDIT_MESSAGE_CHARS")?
                .unwrap_or(defaults.audit_message_chars),
            block_bots: parse_var("CHAT_RELAY_BLOCK_BOTS")?.unwrap_or(defaults.block_bots),
            verification,
        })
    }
}

/// Terminal client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of a running relay
    pub relay_url: String,
    /// Challenge token sent to `/api/verify` before the first turn
    pub verify_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://localhost:3000".to_string(),
            verify_token: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            relay_url: var("CHAT_RELAY_URL").unwrap_or_else(|| Self::default().relay_url),
            verify_token: var("CHAT_RELAY_VERIFY_TOKEN"),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("Invalid value for {}", key))
}
