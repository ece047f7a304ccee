use chrono::Utc;
use tracing::{debug, info, warn};

use super::artifact;
use super::batch::{
    partition, BatchKind, BatchListing, BatchReport, RecoveryOutcome, StuckRecovery, TaskFix,
};
use crate::config::RecoveryConfig;
use crate::error::{Result, WardenError};
use crate::tasks::TaskStore;

/// The tiered recovery engine.
///
/// Reads a snapshot of review-pending tasks, buckets them by failure
/// signature and applies the least-invasive remediation per bucket,
/// writing control files the external watcher consumes. Task state
/// itself is external; this engine only classifies and remediates.
pub struct BatchEngine {
    store: TaskStore,
    config: RecoveryConfig,
}

impl BatchEngine {
    pub fn new(store: TaskStore, config: RecoveryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Current batches over tasks parked in human review.
    pub async fn list_review_batches(&self) -> Result<BatchListing> {
        let tasks = self.store.review_pending().await?;
        let total = tasks.len();
        let batches = partition(&tasks);
        debug!(total, batches = batches.len(), "review batches computed");
        Ok(BatchListing {
            batches,
            total_tasks_in_human_review: total,
        })
    }

    /// Apply one batch. Per-task failures are recorded and the loop
    /// continues; the only fatal error is being unable to reach the
    /// task tree at all.
    pub async fn process_batch(&self, kind: BatchKind, fixes: &[TaskFix]) -> Result<BatchReport> {
        if !self.config.enabled {
            return Err(WardenError::Recovery(
                "recovery is disabled in the configuration".to_string(),
            ));
        }

        let mut report = BatchReport::default();

        // Tasks are remediated one at a time so each task's primary and
        // mirror files only ever have a single writer.
        for fix in fixes {
            let outcome = match self.process_task(kind, fix).await {
                Ok((action, priority)) => RecoveryOutcome {
                    task_id: fix.task_id.clone(),
                    success: true,
                    action,
                    priority,
                    error: None,
                },
                Err(e) if e.is_task_local() => {
                    warn!(task = %fix.task_id, error = %e, "task remediation failed");
                    RecoveryOutcome {
                        task_id: fix.task_id.clone(),
                        success: false,
                        action: "none".to_string(),
                        priority: kind.base_priority(),
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            report.record(outcome);
        }

        info!(
            kind = %kind,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch processed"
        );
        Ok(report)
    }

    async fn process_task(&self, kind: BatchKind, fix: &TaskFix) -> Result<(String, u8)> {
        let task_id = &fix.task_id;
        let mut control = self.store.load_control(task_id).await?;

        if control.rdr_iteration >= self.config.max_iterations {
            return Err(WardenError::Recovery(format!(
                "restart ceiling reached after {} iterations",
                control.rdr_iteration
            )));
        }

        let (action, priority) = match kind {
            BatchKind::Incomplete => {
                // Tier 1: the watcher re-derives the board from subtask
                // completion, so a restart is all that's needed.
                if self.config.context_notes {
                    if let Some(feedback) = &fix.feedback {
                        self.store
                            .write_context_note(
                                task_id,
                                &artifact::context_note(
                                    task_id,
                                    feedback,
                                    self.config.max_feedback_chars,
                                ),
                            )
                            .await?;
                    }
                }
                ("restart".to_string(), 1)
            }
            BatchKind::JsonError => match self.store.check_plan(task_id).await {
                // Plan parses after all: nothing to fix, tier 1 restart.
                Ok(()) => ("restart".to_string(), 1),
                Err(parse_error) => {
                    self.store
                        .write_fix_request(
                            task_id,
                            &artifact::parse_error_fix_request(task_id, &parse_error),
                        )
                        .await?;
                    ("fix_request".to_string(), 2)
                }
            },
            BatchKind::QaRejected | BatchKind::Errors => {
                let content = artifact::fix_request(
                    task_id,
                    kind,
                    &control,
                    fix.feedback.as_deref(),
                    self.config.max_feedback_chars,
                );
                self.store.write_fix_request(task_id, &content).await?;
                ("fix_request".to_string(), 2)
            }
        };

        control.request_start(kind.as_str(), priority);
        self.store.save_control(task_id, &control).await?;

        Ok((action, priority))
    }

    /// Minimal single-task recovery: unflag the stuck marker, and either
    /// queue a restart (tier 4 manual nudge) or just refresh the
    /// activity timestamp so the task is not immediately re-flagged.
    pub async fn recover_stuck_task(
        &self,
        task_id: &str,
        auto_restart: bool,
    ) -> Result<StuckRecovery> {
        let mut control = self.store.load_control(task_id).await?;
        control.metadata.stuck_since = None;

        let action = if auto_restart {
            control.request_start("manual", 4);
            "restarted"
        } else {
            control.metadata.last_activity = Some(Utc::now());
            control.touch();
            "activity_refreshed"
        };

        self.store.save_control(task_id, &control).await?;
        info!(task = task_id, action, "stuck task recovered");

        Ok(StuckRecovery {
            recovered: true,
            action: action.to_string(),
        })
    }
}
