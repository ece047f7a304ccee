use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::machines::{
    FeatureContext, FeatureState, Progress, ReviewContext, ReviewResult, ReviewState,
    TaskRunContext, TaskRunState,
};

/// State-change notification for a review actor, one per semantically
/// distinct snapshot. Wire fields are camelCase for the downstream
/// observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    /// `projectId:number`.
    pub key: String,
    pub state: ReviewState,
    pub is_reviewing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReviewResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_result: Option<ReviewResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_external_review: bool,
    pub is_followup: bool,
}

impl ReviewUpdate {
    pub fn from_snapshot(state: ReviewState, context: &ReviewContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.number),
            state,
            is_reviewing: state.is_reviewing(),
            started_at: context.started_at,
            progress: context.progress.clone(),
            result: context.result.clone(),
            previous_result: context.previous_result.clone(),
            error: context.error.clone(),
            is_external_review: context.is_external_review,
            is_followup: context.is_followup,
        }
    }

    /// Final idle update emitted on teardown, keeping the identifiers from
    /// the captured pre-teardown context so the observer can correlate.
    pub fn idle(context: &ReviewContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.number),
            state: ReviewState::Idle,
            is_reviewing: false,
            started_at: None,
            progress: None,
            result: None,
            previous_result: None,
            error: None,
            is_external_review: false,
            is_followup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunUpdate {
    pub key: String,
    pub state: TaskRunState,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRunUpdate {
    pub fn from_snapshot(state: TaskRunState, context: &TaskRunContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.task_id),
            state,
            is_running: state == TaskRunState::Running,
            started_at: context.started_at,
            progress: context.progress.clone(),
            error: context.error.clone(),
        }
    }

    pub fn idle(context: &TaskRunContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.task_id),
            state: TaskRunState::Idle,
            is_running: false,
            started_at: None,
            progress: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUpdate {
    pub key: String,
    pub state: FeatureState,
    pub is_generating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeatureUpdate {
    pub fn from_snapshot(state: FeatureState, context: &FeatureContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.feature_id),
            state,
            is_generating: state == FeatureState::Generating,
            started_at: context.started_at,
            progress: context.progress.clone(),
            error: context.error.clone(),
        }
    }

    pub fn idle(context: &FeatureContext) -> Self {
        Self {
            key: format!("{}:{}", context.project_id, context.feature_id),
            state: FeatureState::Idle,
            is_generating: false,
            started_at: None,
            progress: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::ReviewKey;

    #[test]
    fn test_review_update_wire_shape() {
        let key = ReviewKey::new("p1", 7);
        let mut context = ReviewContext::new(&key);
        context.is_followup = true;

        let update = ReviewUpdate::from_snapshot(ReviewState::Reviewing, &context);
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json["key"], "p1:7");
        assert_eq!(json["state"], "reviewing");
        assert_eq!(json["isReviewing"], true);
        assert_eq!(json["isFollowup"], true);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_idle_update_keeps_identifiers() {
        let key = ReviewKey::new("p1", 7);
        let mut context = ReviewContext::new(&key);
        context.error = Some("boom".to_string());

        let update = ReviewUpdate::idle(&context);
        assert_eq!(update.key, "p1:7");
        assert_eq!(update.state, ReviewState::Idle);
        assert!(update.error.is_none());
    }
}
