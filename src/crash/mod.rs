//! Crash-signal polling.
//!
//! The external watcher drops a crash artifact when the agent process
//! dies; the poller reads it, logs a formatted report and deletes the
//! file so every artifact is processed at most once.

mod poller;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use poller::CrashPoller;

/// The crash artifact, a tagged union distinguishing one crash from a
/// detected crash loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrashNotification {
    #[serde(rename_all = "camelCase")]
    Crash {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<String>,
        #[serde(default)]
        logs: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    CrashLoop {
        timestamp: DateTime<Utc>,
        crash_count: u32,
        restart_count: u32,
        auto_restart: bool,
        #[serde(default)]
        logs: Vec<String>,
    },
}

impl CrashNotification {
    /// Human-readable multi-line report; a crash loop reads as an
    /// ongoing condition, a single crash as one event.
    pub fn report(&self) -> String {
        match self {
            Self::Crash {
                timestamp,
                exit_code,
                signal,
                logs,
            } => {
                let mut lines = vec![
                    "Agent process crashed".to_string(),
                    format!("  at: {}", timestamp.to_rfc3339()),
                ];
                if let Some(code) = exit_code {
                    lines.push(format!("  exit code: {}", code));
                }
                if let Some(signal) = signal {
                    lines.push(format!("  signal: {}", signal));
                }
                push_log_tail(&mut lines, logs);
                lines.join("\n")
            }
            Self::CrashLoop {
                timestamp,
                crash_count,
                restart_count,
                auto_restart,
                logs,
            } => {
                let mut lines = vec![
                    "Agent process is crash-looping".to_string(),
                    format!("  last crash: {}", timestamp.to_rfc3339()),
                    format!("  crashes: {}, restarts: {}", crash_count, restart_count),
                    if *auto_restart {
                        "  auto-restart is still enabled".to_string()
                    } else {
                        "  auto-restart has been disabled; manual intervention required"
                            .to_string()
                    },
                ];
                push_log_tail(&mut lines, logs);
                lines.join("\n")
            }
        }
    }
}

fn push_log_tail(lines: &mut Vec<String>, logs: &[String]) {
    if logs.is_empty() {
        return;
    }
    lines.push("  last output:".to_string());
    for log in logs.iter().rev().take(10).rev() {
        lines.push(format!("    {}", log));
    }
}
