use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Project root not found: {0}")]
    ProjectRootNotFound(String),

    #[error("Project not initialized. Run 'warden init' first.")]
    NotInitialized,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task directory missing: {0}")]
    TaskDirMissing(PathBuf),

    #[error("Control file error at {path}: {message}")]
    ControlFile { path: PathBuf, message: String },

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Recovery error: {0}")]
    Recovery(String),

    #[error("Unknown batch type: {0}")]
    UnknownBatchType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WardenError {
    /// Per-task failures are recorded in batch results and never abort the
    /// surrounding pass; everything else propagates to the caller.
    pub fn is_task_local(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_)
                | Self::TaskDirMissing(_)
                | Self::ControlFile { .. }
                | Self::Recovery(_)
                | Self::Json(_)
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
