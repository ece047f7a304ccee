//! Roadmap-feature lifecycle machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lifecycle, Progress};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub project_id: String,
    pub feature_id: String,
}

impl FeatureKey {
    pub fn new(project_id: impl Into<String>, feature_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            feature_id: feature_id.into(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.feature_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureState {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureContext {
    pub project_id: String,
    pub feature_id: String,
    pub progress: Option<Progress>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FeatureContext {
    pub fn new(key: &FeatureKey) -> Self {
        Self {
            project_id: key.project_id.clone(),
            feature_id: key.feature_id.clone(),
            progress: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn reset(&self) -> Self {
        Self::new(&FeatureKey::new(
            self.project_id.clone(),
            self.feature_id.clone(),
        ))
    }
}

#[derive(Debug, Clone)]
pub enum FeatureEvent {
    StartGeneration,
    SetProgress(Progress),
    Complete,
    Fail(String),
    Clear,
}

pub struct FeatureMachine;

impl Lifecycle for FeatureMachine {
    type State = FeatureState;
    type Context = FeatureContext;
    type Event = FeatureEvent;

    fn initial_state() -> FeatureState {
        FeatureState::Idle
    }

    fn apply(
        state: FeatureState,
        context: &FeatureContext,
        event: FeatureEvent,
    ) -> Option<(FeatureState, FeatureContext)> {
        use FeatureEvent::*;
        use FeatureState::*;

        match (state, event) {
            (Idle, StartGeneration) => {
                let mut next = context.reset();
                next.started_at = Some(Utc::now());
                Some((Generating, next))
            }
            (Generating, SetProgress(progress)) => {
                let mut next = context.clone();
                next.progress = Some(progress.merged_into(context.progress.as_ref()));
                Some((Generating, next))
            }
            (Generating, Complete) => {
                let mut next = context.clone();
                next.completed_at = Some(Utc::now());
                Some((Completed, next))
            }
            (Generating, Fail(message)) => {
                let mut next = context.clone();
                next.error = Some(message);
                next.completed_at = Some(Utc::now());
                Some((Error, next))
            }
            (Completed | Error, Clear) => Some((Idle, context.reset())),
            _ => None,
        }
    }

    fn is_settled(state: FeatureState) -> bool {
        matches!(state, FeatureState::Completed | FeatureState::Error)
    }

    fn fingerprint(state: FeatureState, context: &FeatureContext) -> String {
        format!(
            "{}|{}|{}",
            state,
            context
                .progress
                .as_ref()
                .map(Progress::summary)
                .unwrap_or_default(),
            context.error.as_deref().unwrap_or("")
        )
    }
}
