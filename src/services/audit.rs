//! Audit Log
//!
//! One JSON line per relayed turn, appended through a non-blocking writer.
//! Recording never waits on the disk: the entry is finished on a spawned
//! task and handed to the appender's worker thread, which drops lines rather
//! than apply back-pressure.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::safety::DeviceClass;

/// How a relayed turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    BackendFailed,
    ClientDisconnected,
}

/// Host memory and load at the time a turn finished
#[derive(Debug, Clone, Serialize)]
pub struct HostTelemetry {
    pub used_memory_mb: u64,
    pub total_memory_mb: u64,
    pub process_memory_mb: u64,
    pub load_average_1m: f64,
}

impl HostTelemetry {
    /// Blocking; refreshes memory counters and this process only.
    pub fn sample() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let process_memory = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid).map(|p| p.memory())
            })
            .unwrap_or(0);

        Self {
            used_memory_mb: sys.used_memory() / 1024 / 1024,
            total_memory_mb: sys.total_memory() / 1024 / 1024,
            process_memory_mb: process_memory / 1024 / 1024,
            load_average_1m: System::load_average().one,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub device: DeviceClass,
    /// Already truncated by the caller
    pub message: String,
    pub outcome: TurnOutcome,
    pub forwarded_turns: usize,
    pub relayed_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<HostTelemetry>,
}

/// Append-only audit sink. Cheap to clone.
#[derive(Clone, Default)]
pub struct AuditLog {
    writer: Option<NonBlocking>,
}

impl AuditLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Daily-rotated `access.<date>.log` files under `dir`.
    ///
    /// The returned guard flushes pending lines on drop; keep it alive for
    /// the lifetime of the server.
    pub fn in_dir(dir: &Path) -> Result<(Self, WorkerGuard)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create audit directory {}", dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("access")
            .filename_suffix("log")
            .build(dir)
            .context("Failed to open audit log")?;

        Ok(Self::with_writer(appender))
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> (Self, WorkerGuard) {
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);
        (
            Self {
                writer: Some(non_blocking),
            },
            guard,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Fire-and-forget. Telemetry is sampled off the async runtime.
    pub fn record(&self, mut entry: AuditEntry) {
        let Some(mut writer) = self.writer.clone() else {
            return;
        };

        tokio::spawn(async move {
            entry.telemetry = tokio::task::spawn_blocking(HostTelemetry::sample).await.ok();

            let mut line = match serde_json::to_string(&entry) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to serialize audit entry: {}", e);
                    return;
                }
            };
            line.push('\n');

            if let Err(e) = writer.write_all(line.as_bytes()) {
                warn!("Failed to write audit entry: {}", e);
            }
        });
    }
}
