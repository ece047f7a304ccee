//! Configuration types and loading.
//!
//! `WardenConfig` is the top-level configuration with validation;
//! `ProjectPaths` resolves every path the warden touches from a single
//! project root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, WardenError};

pub const CONTROL_FILE: &str = "task.json";
pub const PLAN_FILE: &str = "plan.json";
pub const FIX_REQUEST_FILE: &str = "fix_request.md";
pub const CRASH_FILE: &str = "crash.json";
pub const PROFILES_FILE: &str = "profiles.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub recovery: RecoveryConfig,
    pub crash: CrashConfig,
    pub classifier: ClassifierConfig,
    pub notification: NotificationConfig,
}

impl WardenConfig {
    pub async fn load(warden_dir: &Path) -> Result<Self> {
        let config_path = warden_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, warden_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = warden_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| WardenError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.crash.poll_interval_secs == 0 {
            errors.push("crash.poll_interval_secs must be greater than 0");
        }
        if self.recovery.max_feedback_chars == 0 {
            errors.push("recovery.max_feedback_chars must be greater than 0");
        }
        if self.recovery.max_iterations == 0 {
            errors.push("recovery.max_iterations must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub enabled: bool,
    /// Write a short context note for incomplete tasks before restarting
    /// them (the watcher re-derives the board either way).
    pub context_notes: bool,
    /// Feedback longer than this is truncated in fix-request artifacts.
    pub max_feedback_chars: usize,
    /// Restart requests stop once `rdr_iteration` reaches this ceiling.
    pub max_iterations: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_notes: true,
            max_feedback_chars: 4000,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Swap to the best alternative profile when the active one is limited.
    pub auto_swap_profiles: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            auto_swap_profiles: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Echo every state-change payload to the log.
    pub log_updates: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_updates: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub warden_dir: PathBuf,
    pub tasks_dir: PathBuf,
    pub workspaces_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf) -> Self {
        let warden_dir = root.join(".warden");

        Self {
            tasks_dir: warden_dir.join("tasks"),
            workspaces_dir: warden_dir.join("workspaces"),
            logs_dir: warden_dir.join("logs"),
            root,
            warden_dir,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            &self.warden_dir,
            &self.tasks_dir,
            &self.workspaces_dir,
            &self.logs_dir,
        ];

        for dir in dirs {
            fs::create_dir_all(dir).await?;
        }

        Ok(())
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.tasks_dir.join(task_id)
    }

    /// The isolated workspace copy for a task, when one was provisioned.
    pub fn workspace_dir(&self, task_id: &str) -> PathBuf {
        self.workspaces_dir.join(task_id)
    }

    pub fn crash_file(&self) -> PathBuf {
        self.warden_dir.join(CRASH_FILE)
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.warden_dir.join(PROFILES_FILE)
    }
}
