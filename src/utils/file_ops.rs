use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;

/// Write a file atomically: temp file, best-effort fsync, rename.
///
/// A crash mid-write leaves at most a `.tmp` leftover, never a partial
/// target file; `remove_interrupted_writes` sweeps those up on init.
pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, content).await?;

    // Sync via spawn_blocking to avoid blocking the async runtime.
    let tmp_path_clone = tmp_path.clone();
    let sync_result = tokio::task::spawn_blocking(move || {
        std::fs::File::open(&tmp_path_clone).and_then(|file| file.sync_all())
    })
    .await;

    match sync_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to sync temp file to disk"),
        Err(e) => warn!(error = %e, "Failed to sync temp file to disk"),
    }

    fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), "Atomic write completed");
    Ok(())
}

/// Remove `.tmp` leftovers from interrupted writes under a directory.
pub async fn remove_interrupted_writes(dir: &Path) {
    if let Ok(mut entries) = fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                debug!(path = %path.display(), "Removing interrupted write");
                let _ = fs::remove_file(&path).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");

        write_atomic(&path, "{\"ok\":true}").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "{\"ok\":true}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_interrupted_writes_sweeps_tmp_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("task.json.tmp"), "partial")
            .await
            .unwrap();
        fs::write(dir.path().join("task.json"), "whole")
            .await
            .unwrap();

        remove_interrupted_writes(dir.path()).await;

        assert!(!dir.path().join("task.json.tmp").exists());
        assert!(dir.path().join("task.json").exists());
    }
}
