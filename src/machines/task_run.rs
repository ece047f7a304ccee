//! Task-execution lifecycle machine, same shape as the review machine
//! with its own enumeration.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lifecycle, Progress};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub project_id: String,
    pub task_id: String,
}

impl TaskKey {
    pub fn new(project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.task_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskRunState {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl TaskRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunContext {
    pub project_id: String,
    pub task_id: String,
    pub progress: Option<Progress>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRunContext {
    pub fn new(key: &TaskKey) -> Self {
        Self {
            project_id: key.project_id.clone(),
            task_id: key.task_id.clone(),
            progress: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn reset(&self) -> Self {
        Self::new(&TaskKey::new(self.project_id.clone(), self.task_id.clone()))
    }
}

#[derive(Debug, Clone)]
pub enum TaskRunEvent {
    Start,
    SetProgress(Progress),
    Complete,
    Fail(String),
    Clear,
}

pub struct TaskRunMachine;

impl Lifecycle for TaskRunMachine {
    type State = TaskRunState;
    type Context = TaskRunContext;
    type Event = TaskRunEvent;

    fn initial_state() -> TaskRunState {
        TaskRunState::Idle
    }

    fn apply(
        state: TaskRunState,
        context: &TaskRunContext,
        event: TaskRunEvent,
    ) -> Option<(TaskRunState, TaskRunContext)> {
        use TaskRunEvent::*;
        use TaskRunState::*;

        match (state, event) {
            (Idle, Start) => {
                let mut next = context.reset();
                next.started_at = Some(Utc::now());
                Some((Running, next))
            }
            (Running, SetProgress(progress)) => {
                let mut next = context.clone();
                next.progress = Some(progress.merged_into(context.progress.as_ref()));
                Some((Running, next))
            }
            (Running, Complete) => {
                let mut next = context.clone();
                next.completed_at = Some(Utc::now());
                Some((Completed, next))
            }
            (Running, Fail(message)) => {
                let mut next = context.clone();
                next.error = Some(message);
                next.completed_at = Some(Utc::now());
                Some((Error, next))
            }
            (Completed | Error, Clear) => Some((Idle, context.reset())),
            _ => None,
        }
    }

    fn is_settled(state: TaskRunState) -> bool {
        matches!(state, TaskRunState::Completed | TaskRunState::Error)
    }

    fn fingerprint(state: TaskRunState, context: &TaskRunContext) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_to_completion() {
        let key = TaskKey::new("p1", "task-3");
        let state = TaskRunMachine::initial_state();
        let context = TaskRunContext::new(&key);

        let (state, context) =
            TaskRunMachine::apply(state, &context, TaskRunEvent::Start).unwrap();
        assert_eq!(state, TaskRunState::Running);

        let (state, context) =
            TaskRunMachine::apply(state, &context, TaskRunEvent::Complete).unwrap();
        assert_eq!(state, TaskRunState::Completed);
        assert!(context.completed_at.is_some());
        assert!(TaskRunMachine::is_settled(state));
    }

    #[test]
    fn test_complete_without_start_is_undefined() {
        let key = TaskKey::new("p1", "task-3");
        let context = TaskRunContext::new(&key);
        assert!(
            TaskRunMachine::apply(TaskRunState::Idle, &context, TaskRunEvent::Complete).is_none()
        );
    }
}
