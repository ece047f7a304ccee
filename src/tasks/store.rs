use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, warn};

use super::control::ControlFile;
use crate::config::{CONTROL_FILE, FIX_REQUEST_FILE, PLAN_FILE, ProjectPaths};
use crate::error::{Result, WardenError};
use crate::utils::{remove_interrupted_writes, write_atomic};

/// Two-target writer: the primary write propagates failure, the mirror
/// write into the isolated workspace copy is best-effort and only
/// logged. Both locations must end up with identical bytes when the
/// mirror succeeds, since the external executor reads the workspace
/// copy.
pub struct MirroredWriter {
    primary: PathBuf,
    mirror: Option<PathBuf>,
}

impl MirroredWriter {
    pub fn new(primary: PathBuf, mirror: Option<PathBuf>) -> Self {
        Self { primary, mirror }
    }

    pub async fn write(&self, content: &str) -> Result<()> {
        write_atomic(&self.primary, content).await?;

        if let Some(mirror) = &self.mirror {
            if let Err(e) = write_atomic(mirror, content).await {
                warn!(
                    path = %mirror.display(),
                    error = %e,
                    "mirror write failed, primary is authoritative"
                );
            }
        }
        Ok(())
    }
}

/// File-backed task collaborator: control files, plan files and
/// fix-request artifacts under the primary tasks dir, mirrored into the
/// per-task isolated workspace when one was provisioned.
pub struct TaskStore {
    paths: ProjectPaths,
}

impl TaskStore {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub async fn init(&self) -> Result<()> {
        self.paths.ensure_dirs().await?;
        if let Ok(mut entries) = fs::read_dir(&self.paths.tasks_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().is_dir() {
                    remove_interrupted_writes(&entry.path()).await;
                }
            }
        }
        Ok(())
    }

    fn control_path(&self, task_id: &str) -> PathBuf {
        self.paths.task_dir(task_id).join(CONTROL_FILE)
    }

    pub fn plan_path(&self, task_id: &str) -> PathBuf {
        self.paths.task_dir(task_id).join(PLAN_FILE)
    }

    /// Mirror location for `file_name`, present only when the task has
    /// an isolated workspace copy.
    fn mirror_path(&self, task_id: &str, file_name: &str) -> Option<PathBuf> {
        let workspace = self.paths.workspace_dir(task_id);
        workspace.is_dir().then(|| workspace.join(file_name))
    }

    pub async fn load_control(&self, task_id: &str) -> Result<ControlFile> {
        let dir = self.paths.task_dir(task_id);
        if !dir.is_dir() {
            return Err(WardenError::TaskDirMissing(dir));
        }

        let path = self.control_path(task_id);
        let content = fs::read_to_string(&path).await.map_err(|e| {
            WardenError::ControlFile {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        serde_json::from_str(&content).map_err(|e| WardenError::ControlFile {
            path,
            message: e.to_string(),
        })
    }

    /// Write the control file to the primary dir and mirror it into the
    /// workspace copy so watcher and executor agree.
    pub async fn save_control(&self, task_id: &str, control: &ControlFile) -> Result<()> {
        let content = serde_json::to_string_pretty(control)?;
        let writer = MirroredWriter::new(
            self.control_path(task_id),
            self.mirror_path(task_id, CONTROL_FILE),
        );
        writer.write(&content).await?;
        debug!(task = task_id, status = ?control.status, "control file saved");
        Ok(())
    }

    /// Overwrite (never append) the fix-request artifact for a task.
    pub async fn write_fix_request(&self, task_id: &str, content: &str) -> Result<()> {
        let writer = MirroredWriter::new(
            self.paths.task_dir(task_id).join(FIX_REQUEST_FILE),
            self.mirror_path(task_id, FIX_REQUEST_FILE),
        );
        writer.write(content).await
    }

    /// Short context note left next to the control file for restarted
    /// incomplete tasks.
    pub async fn write_context_note(&self, task_id: &str, content: &str) -> Result<()> {
        let writer = MirroredWriter::new(
            self.paths.task_dir(task_id).join("context.md"),
            self.mirror_path(task_id, "context.md"),
        );
        writer.write(content).await
    }

    /// Validity check for the plan file: `Ok(())` when it parses as
    /// JSON, the parse error text otherwise. A missing plan counts as
    /// invalid.
    pub async fn check_plan(&self, task_id: &str) -> std::result::Result<(), String> {
        let path = self.plan_path(task_id);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        serde_json::from_str::<serde_json::Value>(&content)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// All tasks the recovery engine should look at, sorted by id for a
    /// stable batch order.
    pub async fn review_pending(&self) -> Result<Vec<(String, ControlFile)>> {
        let mut tasks = Vec::new();

        if !self.paths.tasks_dir.is_dir() {
            return Ok(tasks);
        }

        let mut entries = fs::read_dir(&self.paths.tasks_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(task_id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match self.load_control(task_id).await {
                Ok(control) if control.is_review_pending() => {
                    tasks.push((task_id.to_string(), control));
                }
                Ok(_) => {}
                Err(e) => {
                    // Corrupt entries surface later, per task, when a batch
                    // actually touches them.
                    debug!(task = task_id, error = %e, "skipping unreadable control file");
                }
            }
        }

        tasks.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::control::{TaskStatus, JSON_ERROR_MARKER};

    async fn store_in(dir: &std::path::Path) -> TaskStore {
        let store = TaskStore::new(ProjectPaths::new(dir.to_path_buf()));
        store.init().await.unwrap();
        store
    }

    async fn seed(store: &TaskStore, task_id: &str, control: &ControlFile) {
        let dir = store.paths().task_dir(task_id);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(
            dir.join(CONTROL_FILE),
            serde_json::to_string_pretty(control).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_review_pending_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        seed(&store, "b-task", &ControlFile::new(TaskStatus::HumanReview, "b")).await;
        seed(&store, "a-task", &ControlFile::new(TaskStatus::HumanReview, "a")).await;
        seed(&store, "done", &ControlFile::new(TaskStatus::Done, "d")).await;

        let pending = store.review_pending().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a-task", "b-task"]);
    }

    #[tokio::test]
    async fn test_force_recovery_flag_includes_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let mut control = ControlFile::new(TaskStatus::InProgress, "wedged");
        control.metadata.force_recovery = Some(true);
        seed(&store, "wedged", &control).await;

        let pending = store.review_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_dir_is_task_local_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let err = store.load_control("ghost").await.unwrap_err();
        assert!(err.is_task_local());
    }

    #[tokio::test]
    async fn test_save_control_mirrors_into_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let control = ControlFile::new(TaskStatus::HumanReview, "t");
        seed(&store, "t1", &control).await;
        fs::create_dir_all(store.paths().workspace_dir("t1"))
            .await
            .unwrap();

        store.save_control("t1", &control).await.unwrap();

        let primary = fs::read_to_string(store.paths().task_dir("t1").join(CONTROL_FILE))
            .await
            .unwrap();
        let mirror = fs::read_to_string(store.paths().workspace_dir("t1").join(CONTROL_FILE))
            .await
            .unwrap();
        assert_eq!(primary, mirror);
    }

    #[tokio::test]
    async fn test_save_without_workspace_skips_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let control = ControlFile::new(TaskStatus::HumanReview, "t");
        seed(&store, "solo", &control).await;
        store.save_control("solo", &control).await.unwrap();

        assert!(!store.paths().workspace_dir("solo").exists());
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_fail_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("task.json");
        let mirror = dir.path().join("no-such-dir").join("task.json");

        let writer = MirroredWriter::new(primary.clone(), Some(mirror));
        writer.write(r#"{"status":"done"}"#).await.unwrap();

        assert_eq!(
            fs::read_to_string(&primary).await.unwrap(),
            r#"{"status":"done"}"#
        );
    }

    #[tokio::test]
    async fn test_check_plan_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let control = ControlFile::new(
            TaskStatus::HumanReview,
            format!("{} broken", JSON_ERROR_MARKER),
        );
        seed(&store, "j1", &control).await;

        fs::write(store.plan_path("j1"), "{not json")
            .await
            .unwrap();
        assert!(store.check_plan("j1").await.is_err());

        fs::write(store.plan_path("j1"), r#"{"steps": []}"#)
            .await
            .unwrap();
        assert!(store.check_plan("j1").await.is_ok());
    }
}
