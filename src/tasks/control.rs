use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel prefix marking a task whose plan failed to parse as JSON.
pub const JSON_ERROR_MARKER: &str = "[JSON_PARSE_ERROR]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    /// Parked board column for completed-but-unaccepted work; the
    /// external watcher never resumes these on its own, which makes it
    /// the review-pending set the recovery engine scans.
    HumanReview,
    /// Queued for the external watcher to restart.
    StartRequested,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub status: SubtaskStatus,
}

impl Subtask {
    pub fn is_completed(&self) -> bool {
        self.status == SubtaskStatus::Completed
    }
}

/// Free-form metadata the warden shares with the watcher. Wire fields
/// are camelCase; unknown entries round-trip untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stuck_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_recovery: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The per-task control file (`task.json`), shared with the external
/// watcher. Only the fields below are interpreted; everything else the
/// watcher or executor wrote rides along through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFile {
    pub status: TaskStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_requested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdr_batch_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdr_priority: Option<u8>,
    #[serde(default)]
    pub rdr_iteration: u32,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ControlFile {
    pub fn new(status: TaskStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            subtasks: Vec::new(),
            qa_rejection_reason: None,
            last_error: None,
            start_requested_at: None,
            rdr_batch_type: None,
            rdr_priority: None,
            rdr_iteration: 0,
            metadata: TaskMetadata::default(),
            updated_at: None,
            extra: Map::new(),
        }
    }

    pub fn has_json_error_marker(&self) -> bool {
        self.description.starts_with(JSON_ERROR_MARKER)
    }

    /// `(completed, total)` over subtasks.
    pub fn subtask_progress(&self) -> (usize, usize) {
        let total = self.subtasks.len();
        let completed = self.subtasks.iter().filter(|s| s.is_completed()).count();
        (completed, total)
    }

    pub fn has_incomplete_subtasks(&self) -> bool {
        self.subtasks.iter().any(|s| !s.is_completed())
    }

    /// Whether the recovery engine should consider this task at all:
    /// parked in human review, or explicitly flagged for recovery.
    pub fn is_review_pending(&self) -> bool {
        self.status == TaskStatus::HumanReview
            || self.metadata.force_recovery.unwrap_or(false)
    }

    /// Queue a restart for the external watcher: flip status, stamp the
    /// request time, record how recovery classified the task, and bump
    /// the monotonic iteration counter.
    pub fn request_start(&mut self, batch_type: &str, priority: u8) {
        let now = Utc::now();
        self.status = TaskStatus::StartRequested;
        self.start_requested_at = Some(now);
        self.rdr_batch_type = Some(batch_type.to_string());
        self.rdr_priority = Some(priority);
        self.rdr_iteration += 1;
        self.updated_at = Some(now);
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
