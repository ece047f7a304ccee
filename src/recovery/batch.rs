use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::tasks::ControlFile;

/// Failure signature of a stalled task. Partitioning checks the kinds
/// in this order and a task only lands in the first one it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    JsonError,
    Incomplete,
    QaRejected,
    Errors,
}

impl BatchKind {
    pub const ALL: [BatchKind; 4] = [
        Self::JsonError,
        Self::Incomplete,
        Self::QaRejected,
        Self::Errors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonError => "json_error",
            Self::Incomplete => "incomplete",
            Self::QaRejected => "qa_rejected",
            Self::Errors => "errors",
        }
    }

    /// Recovery tier before per-task adjustment: 1 is the automatic
    /// board move, 2 the detailed fix request, 3 the technical
    /// auto-fix attempt.
    pub fn base_priority(&self) -> u8 {
        match self {
            Self::Incomplete => 1,
            Self::QaRejected | Self::Errors => 2,
            Self::JsonError => 3,
        }
    }

    fn matches(&self, control: &ControlFile) -> bool {
        match self {
            Self::JsonError => control.has_json_error_marker(),
            Self::Incomplete => control.has_incomplete_subtasks(),
            Self::QaRejected => control.qa_rejection_reason.is_some(),
            Self::Errors => control.last_error.is_some(),
        }
    }
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchKind {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json_error" => Ok(Self::JsonError),
            "incomplete" => Ok(Self::Incomplete),
            "qa_rejected" => Ok(Self::QaRejected),
            "errors" => Ok(Self::Errors),
            other => Err(WardenError::UnknownBatchType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub task_id: String,
    pub description: String,
    pub subtasks_completed: usize,
    pub subtasks_total: usize,
}

/// Ephemeral per-invocation grouping; recomputed from the current task
/// snapshot every time, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBatch {
    pub kind: BatchKind,
    pub priority: u8,
    pub tasks: Vec<BatchTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchListing {
    pub batches: Vec<ReviewBatch>,
    pub total_tasks_in_human_review: usize,
}

/// Bucket review-pending tasks by failure signature, first match wins.
pub fn partition(tasks: &[(String, ControlFile)]) -> Vec<ReviewBatch> {
    let mut buckets: BTreeMap<&'static str, Vec<BatchTask>> = BTreeMap::new();

    for (task_id, control) in tasks {
        let Some(kind) = BatchKind::ALL.iter().find(|k| k.matches(control)) else {
            continue;
        };
        let (completed, total) = control.subtask_progress();
        buckets.entry(kind.as_str()).or_default().push(BatchTask {
            task_id: task_id.clone(),
            description: control.description.clone(),
            subtasks_completed: completed,
            subtasks_total: total,
        });
    }

    BatchKind::ALL
        .iter()
        .filter_map(|kind| {
            buckets.remove(kind.as_str()).map(|tasks| ReviewBatch {
                kind: *kind,
                priority: kind.base_priority(),
                tasks,
            })
        })
        .collect()
}

/// Caller-supplied input for one task in a batch pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFix {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl TaskFix {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// Per-task outcome of applying a batch; caller-facing only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutcome {
    pub task_id: String,
    pub success: bool,
    pub action: String,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub priority_breakdown: BTreeMap<u8, usize>,
    pub results: Vec<RecoveryOutcome>,
}

impl BatchReport {
    pub fn record(&mut self, outcome: RecoveryOutcome) {
        self.processed += 1;
        if outcome.success {
            self.succeeded += 1;
            *self.priority_breakdown.entry(outcome.priority).or_insert(0) += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckRecovery {
    pub recovered: bool,
    pub action: String,
}
