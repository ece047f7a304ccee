//! Fix-request artifact rendering.
//!
//! Artifacts are plain markdown, overwritten on every remediation pass
//! and mirrored into the workspace copy by the store.

use chrono::Utc;

use super::batch::BatchKind;
use crate::tasks::ControlFile;
use crate::utils::truncate_with_marker;

/// Detailed fix request for qa_rejected / errors tasks (tier 2).
pub fn fix_request(
    task_id: &str,
    kind: BatchKind,
    control: &ControlFile,
    feedback: Option<&str>,
    max_feedback_chars: usize,
) -> String {
    let reason = feedback
        .or(control.qa_rejection_reason.as_deref())
        .or(control.last_error.as_deref())
        .unwrap_or("No feedback was provided; re-run the task's verification steps.");

    let mut lines = vec![
        format!("# Fix Request: {}", task_id),
        String::new(),
        format!("- Classification: {}", kind),
        format!("- Requested: {}", Utc::now().to_rfc3339()),
        format!("- Attempt: {}", control.rdr_iteration + 1),
        String::new(),
        "## Feedback".to_string(),
        String::new(),
        truncate_with_marker(reason, max_feedback_chars),
        String::new(),
        "## Suggested investigation".to_string(),
        String::new(),
    ];

    match kind {
        BatchKind::QaRejected => {
            lines.push("1. Reproduce the QA scenario that was rejected.".to_string());
            lines.push("2. Address the feedback above before any other change.".to_string());
            lines.push("3. Re-run the full verification suite before resubmitting.".to_string());
        }
        _ => {
            lines.push("1. Check the task log for the first error, not the last.".to_string());
            lines.push("2. Fix the root cause, then re-run the failing step alone.".to_string());
            lines.push("3. Re-run the full verification suite before resubmitting.".to_string());
        }
    }

    lines.join("\n")
}

/// Fix request for a plan file that does not parse (tier 3 escalated
/// to a detailed request).
pub fn parse_error_fix_request(task_id: &str, parse_error: &str) -> String {
    [
        format!("# Fix Request: {}", task_id),
        String::new(),
        "- Classification: json_error".to_string(),
        format!("- Requested: {}", Utc::now().to_rfc3339()),
        String::new(),
        "## Plan parse failure".to_string(),
        String::new(),
        "The task's plan file is not valid JSON:".to_string(),
        String::new(),
        format!("```\n{}\n```", parse_error),
        String::new(),
        "## Suggested investigation".to_string(),
        String::new(),
        "1. Repair or regenerate the plan file so it parses.".to_string(),
        "2. Remove the error marker from the task description once fixed.".to_string(),
    ]
    .join("\n")
}

/// Short context note left for a restarted incomplete task (tier 1).
pub fn context_note(task_id: &str, feedback: &str, max_feedback_chars: usize) -> String {
    format!(
        "# Context: {}\n\nRestarted with incomplete subtasks. Note from the reviewer:\n\n{}\n",
        task_id,
        truncate_with_marker(feedback, max_feedback_chars)
    )
}
