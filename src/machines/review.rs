//! Review lifecycle machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Lifecycle, Progress};

/// Composite identifier selecting one review actor.
///
/// Renders as `projectId:number`, which is the wire key and the
/// fingerprint-cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewKey {
    pub project_id: String,
    pub number: u64,
}

impl ReviewKey {
    pub fn new(project_id: impl Into<String>, number: u64) -> Self {
        Self {
            project_id: project_id.into(),
            number,
        }
    }
}

impl fmt::Display for ReviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.number)
    }
}

/// Terminal outcome payload returned by the reviewing agent.
///
/// Only `overall_status` is interpreted here; everything else the agent
/// returned rides along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub overall_status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewResult {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            overall_status: status.into(),
            extra: Map::new(),
        }
    }

    /// An `in_progress` outcome means an external actor is already
    /// mid-review; the manager maps it to `DetectExternalReview`.
    pub fn is_in_progress(&self) -> bool {
        self.overall_status == "in_progress"
    }

    pub fn summary(&self) -> String {
        format!("{}:{}", self.overall_status, self.extra.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewState {
    #[default]
    Idle,
    Reviewing,
    ExternalReview,
    Completed,
    Error,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reviewing => "reviewing",
            Self::ExternalReview => "externalReview",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_reviewing(&self) -> bool {
        matches!(self, Self::Reviewing | Self::ExternalReview)
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-actor context, mutated only through machine transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    pub project_id: String,
    pub number: u64,
    pub progress: Option<Progress>,
    pub result: Option<ReviewResult>,
    pub previous_result: Option<ReviewResult>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_followup: bool,
    pub is_external_review: bool,
}

impl ReviewContext {
    pub fn new(key: &ReviewKey) -> Self {
        Self {
            project_id: key.project_id.clone(),
            number: key.number,
            progress: None,
            result: None,
            previous_result: None,
            error: None,
            started_at: None,
            completed_at: None,
            is_followup: false,
            is_external_review: false,
        }
    }

    fn reset(&self) -> Self {
        Self::new(&ReviewKey::new(self.project_id.clone(), self.number))
    }
}

#[derive(Debug, Clone)]
pub enum ReviewEvent {
    StartReview,
    StartFollowup(Option<ReviewResult>),
    SetProgress(Progress),
    Complete(ReviewResult),
    DetectExternalReview(ReviewResult),
    Fail(String),
    Cancel,
    Clear,
}

pub struct ReviewMachine;

impl Lifecycle for ReviewMachine {
    type State = ReviewState;
    type Context = ReviewContext;
    type Event = ReviewEvent;

    fn initial_state() -> ReviewState {
        ReviewState::Idle
    }

    fn apply(
        state: ReviewState,
        context: &ReviewContext,
        event: ReviewEvent,
    ) -> Option<(ReviewState, ReviewContext)> {
        use ReviewEvent::*;
        use ReviewState::*;

        match (state, event) {
            (Idle, StartReview) => {
                let mut next = context.reset();
                next.started_at = Some(Utc::now());
                Some((Reviewing, next))
            }
            (Idle, StartFollowup(previous)) => {
                let mut next = context.reset();
                next.started_at = Some(Utc::now());
                next.is_followup = true;
                next.previous_result = previous;
                Some((Reviewing, next))
            }
            (Reviewing, SetProgress(progress)) => {
                let mut next = context.clone();
                next.progress = Some(progress.merged_into(context.progress.as_ref()));
                Some((Reviewing, next))
            }
            (Reviewing, Complete(result)) => {
                let mut next = context.clone();
                next.result = Some(result);
                next.completed_at = Some(Utc::now());
                Some((Completed, next))
            }
            (Reviewing, DetectExternalReview(result)) => {
                let mut next = context.clone();
                next.result = Some(result);
                next.is_external_review = true;
                Some((ExternalReview, next))
            }
            (Reviewing | ExternalReview, Fail(message)) => {
                let mut next = context.clone();
                next.error = Some(message);
                next.completed_at = Some(Utc::now());
                Some((Error, next))
            }
            (Reviewing | ExternalReview, Cancel) => {
                let mut next = context.clone();
                next.error = Some("Review cancelled".to_string());
                next.completed_at = Some(Utc::now());
                Some((Error, next))
            }
            (Completed | Error, Clear) => Some((Idle, context.reset())),
            // Anything else is deliberately a no-op: callers may re-send a
            // start for an already-started entity.
            _ => None,
        }
    }

    fn is_settled(state: ReviewState) -> bool {
        matches!(state, ReviewState::Completed | ReviewState::Error)
    }

    fn fingerprint(state: ReviewState, context: &ReviewContext) -> String {
        format!(
            "{}|{}|{}|{}",
            state,
            context
                .progress
                .as_ref()
                .map(Progress::summary)
                .unwrap_or_default(),
            context
                .result
                .as_ref()
                .map(ReviewResult::summary)
                .unwrap_or_default(),
            context.error.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (ReviewState, ReviewContext) {
        let key = ReviewKey::new("p1", 42);
        (ReviewMachine::initial_state(), ReviewContext::new(&key))
    }

    fn step(
        state: ReviewState,
        context: &ReviewContext,
        event: ReviewEvent,
    ) -> (ReviewState, ReviewContext) {
        ReviewMachine::apply(state, context, event).expect("transition should be defined")
    }

    #[test]
    fn test_start_review_stamps_started_at() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);

        assert_eq!(state, ReviewState::Reviewing);
        assert!(context.started_at.is_some());
        assert!(!context.is_followup);
        assert!(context.result.is_none());
    }

    #[test]
    fn test_followup_stores_previous_result() {
        let (state, context) = fresh();
        let previous = ReviewResult::with_status("changes_requested");
        let (state, context) = step(
            state,
            &context,
            ReviewEvent::StartFollowup(Some(previous.clone())),
        );

        assert_eq!(state, ReviewState::Reviewing);
        assert!(context.is_followup);
        assert_eq!(context.previous_result, Some(previous));
    }

    #[test]
    fn test_double_start_is_undefined() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        assert!(ReviewMachine::apply(state, &context, ReviewEvent::StartReview).is_none());
    }

    #[test]
    fn test_progress_merges_into_context() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        let (state, context) = step(
            state,
            &context,
            ReviewEvent::SetProgress(Progress::phase("analyzing").with_percent(50)),
        );

        assert_eq!(state, ReviewState::Reviewing);
        let progress = context.progress.as_ref().unwrap();
        assert_eq!(progress.phase.as_deref(), Some("analyzing"));
        assert_eq!(progress.percent, Some(50));
    }

    #[test]
    fn test_stale_progress_does_not_disturb_settled_state() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        let (state, context) = step(
            state,
            &context,
            ReviewEvent::Complete(ReviewResult::with_status("approved")),
        );

        assert!(ReviewMachine::is_settled(state));
        assert!(
            ReviewMachine::apply(state, &context, ReviewEvent::SetProgress(Progress::phase("x")))
                .is_none()
        );
    }

    #[test]
    fn test_external_review_detection() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        let (state, context) = step(
            state,
            &context,
            ReviewEvent::DetectExternalReview(ReviewResult::with_status("in_progress")),
        );

        assert_eq!(state, ReviewState::ExternalReview);
        assert!(context.is_external_review);
    }

    #[test]
    fn test_clear_resets_context_but_keeps_identifiers() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        let (state, context) = step(state, &context, ReviewEvent::Fail("boom".to_string()));
        let (state, context) = step(state, &context, ReviewEvent::Clear);

        assert_eq!(state, ReviewState::Idle);
        assert_eq!(context.project_id, "p1");
        assert_eq!(context.number, 42);
        assert!(context.error.is_none());
        assert!(context.started_at.is_none());
    }

    #[test]
    fn test_fingerprint_changes_with_progress() {
        let (state, context) = fresh();
        let (state, context) = step(state, &context, ReviewEvent::StartReview);
        let before = ReviewMachine::fingerprint(state, &context);

        let (state, context) = step(
            state,
            &context,
            ReviewEvent::SetProgress(Progress::phase("analyzing").with_percent(50)),
        );
        let after = ReviewMachine::fingerprint(state, &context);
        assert_ne!(before, after);

        // Re-sending the identical payload leaves the fingerprint alone.
        let (state, context) = step(
            state,
            &context,
            ReviewEvent::SetProgress(Progress::phase("analyzing").with_percent(50)),
        );
        assert_eq!(after, ReviewMachine::fingerprint(state, &context));
    }
}
