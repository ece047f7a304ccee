//! Pure state-machine definitions for the lifecycles the warden tracks.
//!
//! Machines are declarative transition tables and never perform I/O; all
//! side effects (notifications, teardown, file writes) live in the actor
//! registry and its subscribers.

mod feature;
mod review;
mod task_run;

pub use feature::{FeatureContext, FeatureEvent, FeatureKey, FeatureMachine, FeatureState};
pub use review::{
    ReviewContext, ReviewEvent, ReviewKey, ReviewMachine, ReviewResult, ReviewState,
};
pub use task_run::{TaskKey, TaskRunContext, TaskRunEvent, TaskRunMachine, TaskRunState};

use serde::{Deserialize, Serialize};

/// A lifecycle as a pure transition function over typed states.
///
/// `apply` returns `None` when the event is not defined for the current
/// state; callers must treat that as a silent no-op and leave the actor
/// untouched. Callers may re-send a start event for an already-started
/// entity without crashing or double-transitioning.
pub trait Lifecycle {
    type State: Copy + Eq + std::fmt::Debug + Send + 'static;
    type Context: Clone + Send + 'static;
    type Event: Send + 'static;

    fn initial_state() -> Self::State;

    fn apply(
        state: Self::State,
        context: &Self::Context,
        event: Self::Event,
    ) -> Option<(Self::State, Self::Context)>;

    /// Settled states are resting points that stale progress events must
    /// not overwrite.
    fn is_settled(state: Self::State) -> bool;

    /// Semantic summary of a snapshot; equal fingerprints suppress the
    /// downstream notification.
    fn fingerprint(state: Self::State, context: &Self::Context) -> String;
}

/// Phase/percent/message progress record shared by all machines.
///
/// Merging is field-wise: a field present in the incoming record replaces
/// the stored one, an absent field keeps its previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Progress {
    pub fn phase(phase: impl Into<String>) -> Self {
        Self {
            phase: Some(phase.into()),
            ..Self::default()
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn merged_into(&self, current: Option<&Progress>) -> Progress {
        let Some(current) = current else {
            return self.clone();
        };
        Progress {
            phase: self.phase.clone().or_else(|| current.phase.clone()),
            percent: self.percent.or(current.percent),
            message: self.message.clone().or_else(|| current.message.clone()),
        }
    }

    /// Compact form used in dedup fingerprints.
    pub fn summary(&self) -> String {
        format!(
            "{}:{}:{}",
            self.phase.as_deref().unwrap_or(""),
            self.percent.map(|p| p.to_string()).unwrap_or_default(),
            self.message.as_deref().unwrap_or("")
        )
    }
}
