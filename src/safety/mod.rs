//! Safety Module
//!
//! Request screening in front of the chat API: crawler filtering and the
//! once-per-session human verification gate.

mod user_agent;
pub mod verification;

pub use user_agent::{DeviceClass, UserAgentFilter};
pub use verification::{HumanVerifier, SessionGate, SiteVerifier, DEFAULT_SESSION_TTL, SESSION_COOKIE};
