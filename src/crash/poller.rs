use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::CrashNotification;

/// Periodically consumes the crash artifact: once at startup, then on a
/// fixed interval until shutdown.
pub struct CrashPoller {
    artifact_path: PathBuf,
    interval: Duration,
}

impl CrashPoller {
    pub fn new(artifact_path: PathBuf, interval: Duration) -> Self {
        Self {
            artifact_path,
            interval,
        }
    }

    /// Run until the shutdown channel flips to `true`. The first tick
    /// fires immediately, covering artifacts left over from before this
    /// process started.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("crash poller shutdown");
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle: parse, report, delete. The delete happens even
    /// when parsing fails, so a corrupt artifact is never reprocessed
    /// forever; delete failures themselves are only logged.
    pub async fn check_once(&self) {
        if !self.artifact_path.exists() {
            return;
        }

        match fs::read_to_string(&self.artifact_path).await {
            Ok(content) => match serde_json::from_str::<CrashNotification>(&content) {
                Ok(notification) => info!("{}", notification.report()),
                Err(e) => warn!(
                    path = %self.artifact_path.display(),
                    error = %e,
                    "crash artifact is corrupt, discarding"
                ),
            },
            Err(e) => warn!(
                path = %self.artifact_path.display(),
                error = %e,
                "failed to read crash artifact"
            ),
        }

        if let Err(e) = fs::remove_file(&self.artifact_path).await {
            warn!(
                path = %self.artifact_path.display(),
                error = %e,
                "failed to delete crash artifact"
            );
        }
    }
}
