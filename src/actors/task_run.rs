use std::sync::Arc;

use super::registry::{ActorRegistry, Snapshot};
use crate::machines::{Progress, TaskKey, TaskRunContext, TaskRunEvent, TaskRunMachine};
use crate::notification::{TaskRunUpdate, UpdateSink};

/// Task-execution counterpart of `ReviewManager`, same contract over
/// the task-run machine.
pub struct TaskRunManager {
    registry: ActorRegistry<TaskKey, TaskRunMachine>,
    sink: Arc<dyn UpdateSink<TaskRunUpdate>>,
}

impl TaskRunManager {
    pub fn new(sink: Arc<dyn UpdateSink<TaskRunUpdate>>) -> Self {
        Self {
            registry: ActorRegistry::new(TaskRunContext::new),
            sink,
        }
    }

    pub fn start(&self, project_id: &str, task_id: &str) {
        self.send(project_id, task_id, TaskRunEvent::Start, true);
    }

    pub fn set_progress(&self, project_id: &str, task_id: &str, progress: Progress) {
        self.send(project_id, task_id, TaskRunEvent::SetProgress(progress), false);
    }

    pub fn complete(&self, project_id: &str, task_id: &str) {
        self.send(project_id, task_id, TaskRunEvent::Complete, false);
    }

    pub fn error(&self, project_id: &str, task_id: &str, message: impl Into<String>) {
        self.send(project_id, task_id, TaskRunEvent::Fail(message.into()), false);
    }

    pub fn clear(&self, project_id: &str, task_id: &str) {
        let key = TaskKey::new(project_id, task_id);
        if let Some(captured) = self.registry.take(&key) {
            self.sink.publish(TaskRunUpdate::idle(&captured.context));
        }
    }

    pub fn auth_changed(&self) {
        for (_, captured) in self.registry.drain() {
            self.sink.publish(TaskRunUpdate::idle(&captured.context));
        }
    }

    pub fn get_snapshot(&self, project_id: &str, task_id: &str) -> Option<Snapshot<TaskRunMachine>> {
        self.registry.snapshot(&TaskKey::new(project_id, task_id))
    }

    pub fn shutdown_all(&self) {
        self.registry.clear_all();
    }

    fn send(&self, project_id: &str, task_id: &str, event: TaskRunEvent, create: bool) {
        let key = TaskKey::new(project_id, task_id);
        if let Some(snapshot) = self.registry.send(&key, event, create) {
            self.sink
                .publish(TaskRunUpdate::from_snapshot(snapshot.state, &snapshot.context));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::TaskRunState;
    use crate::notification::CollectSink;

    #[test]
    fn test_keys_are_independent() {
        let sink = Arc::new(CollectSink::new());
        let manager = TaskRunManager::new(sink);

        manager.start("p1", "task-1");
        manager.start("p1", "task-2");
        manager.error("p1", "task-1", "boom");

        assert_eq!(
            manager.get_snapshot("p1", "task-1").unwrap().state,
            TaskRunState::Error
        );
        assert_eq!(
            manager.get_snapshot("p1", "task-2").unwrap().state,
            TaskRunState::Running
        );
    }
}
