//! Side services of the relay

pub mod audit;

pub use audit::{AuditEntry, AuditLog, HostTelemetry, TurnOutcome};
