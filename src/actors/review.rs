use std::sync::Arc;

use tracing::debug;

use super::registry::{ActorRegistry, Snapshot};
use crate::machines::{
    Progress, ReviewContext, ReviewEvent, ReviewKey, ReviewMachine, ReviewResult,
};
use crate::notification::{ReviewUpdate, UpdateSink};

/// Public contract over the review actor registry.
///
/// Owns the mapping from raw caller input to machine events (notably
/// `complete` with an in-progress result becoming
/// `DetectExternalReview`) and emits exactly one notification per
/// semantically distinct snapshot.
pub struct ReviewManager {
    registry: ActorRegistry<ReviewKey, ReviewMachine>,
    sink: Arc<dyn UpdateSink<ReviewUpdate>>,
}

impl ReviewManager {
    pub fn new(sink: Arc<dyn UpdateSink<ReviewUpdate>>) -> Self {
        Self {
            registry: ActorRegistry::new(ReviewContext::new),
            sink,
        }
    }

    pub fn start_review(&self, project_id: &str, number: u64) {
        self.send(project_id, number, ReviewEvent::StartReview, true);
    }

    pub fn start_followup_review(
        &self,
        project_id: &str,
        number: u64,
        previous_result: Option<ReviewResult>,
    ) {
        self.send(
            project_id,
            number,
            ReviewEvent::StartFollowup(previous_result),
            true,
        );
    }

    pub fn set_progress(&self, project_id: &str, number: u64, progress: Progress) {
        self.send(project_id, number, ReviewEvent::SetProgress(progress), false);
    }

    /// Settle a review with the agent's result.
    ///
    /// An `in_progress` result means an external actor is already
    /// mid-review; the mapping to `DetectExternalReview` is this
    /// manager's responsibility, not the machine's.
    pub fn complete(&self, project_id: &str, number: u64, result: ReviewResult) {
        let event = if result.is_in_progress() {
            ReviewEvent::DetectExternalReview(result)
        } else {
            ReviewEvent::Complete(result)
        };
        self.send(project_id, number, event, false);
    }

    pub fn error(&self, project_id: &str, number: u64, message: impl Into<String>) {
        self.send(project_id, number, ReviewEvent::Fail(message.into()), false);
    }

    pub fn cancel(&self, project_id: &str, number: u64) {
        self.send(project_id, number, ReviewEvent::Cancel, false);
    }

    /// Tear down the actor for a key, emitting one final idle update
    /// carrying the identifiers captured before teardown. A clear on an
    /// absent key is a silent no-op.
    pub fn clear(&self, project_id: &str, number: u64) {
        let key = ReviewKey::new(project_id, number);
        if let Some(captured) = self.registry.take(&key) {
            debug!(key = %key, "review actor cleared");
            self.sink.publish(ReviewUpdate::idle(&captured.context));
        }
    }

    /// Bulk teardown on a credential change: every actor is captured and
    /// stopped in one synchronous pass, then one idle update per captured
    /// context goes out.
    pub fn auth_changed(&self) {
        let drained = self.registry.drain();
        debug!(actors = drained.len(), "auth changed, tearing down review actors");
        for (_, captured) in drained {
            self.sink.publish(ReviewUpdate::idle(&captured.context));
        }
    }

    pub fn get_snapshot(&self, project_id: &str, number: u64) -> Option<Snapshot<ReviewMachine>> {
        self.registry.snapshot(&ReviewKey::new(project_id, number))
    }

    /// Process shutdown: silent, no idle updates.
    pub fn shutdown_all(&self) {
        self.registry.clear_all();
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    fn send(&self, project_id: &str, number: u64, event: ReviewEvent, create: bool) {
        let key = ReviewKey::new(project_id, number);
        if let Some(snapshot) = self.registry.send(&key, event, create) {
            self.sink
                .publish(ReviewUpdate::from_snapshot(snapshot.state, &snapshot.context));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::ReviewState;
    use crate::notification::CollectSink;

    fn manager() -> (ReviewManager, Arc<CollectSink<ReviewUpdate>>) {
        let sink = Arc::new(CollectSink::new());
        (ReviewManager::new(sink.clone()), sink)
    }

    #[test]
    fn test_in_progress_result_maps_to_external_review() {
        let (manager, _) = manager();
        manager.start_review("p1", 42);
        manager.complete("p1", 42, ReviewResult::with_status("in_progress"));

        let snapshot = manager.get_snapshot("p1", 42).unwrap();
        assert_eq!(snapshot.state, ReviewState::ExternalReview);
        assert!(snapshot.context.is_external_review);
    }

    #[test]
    fn test_approved_result_completes() {
        let (manager, _) = manager();
        manager.start_review("p1", 42);
        manager.complete("p1", 42, ReviewResult::with_status("approved"));

        let snapshot = manager.get_snapshot("p1", 42).unwrap();
        assert_eq!(snapshot.state, ReviewState::Completed);
        assert_eq!(
            snapshot.context.result.as_ref().unwrap().overall_status,
            "approved"
        );
    }

    #[test]
    fn test_clear_emits_idle_with_captured_identifiers() {
        let (manager, sink) = manager();
        manager.start_review("p1", 42);
        manager.complete("p1", 42, ReviewResult::with_status("approved"));
        manager.clear("p1", 42);

        let updates = sink.updates();
        let last = updates.last().unwrap();
        assert_eq!(last.state, ReviewState::Idle);
        assert_eq!(last.key, "p1:42");
        assert!(manager.get_snapshot("p1", 42).is_none());

        // Clearing again is a no-op and emits nothing further.
        manager.clear("p1", 42);
        assert_eq!(sink.len(), updates.len());
    }
}
