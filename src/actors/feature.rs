use std::sync::Arc;

use super::registry::{ActorRegistry, Snapshot};
use crate::machines::{FeatureContext, FeatureEvent, FeatureKey, FeatureMachine, Progress};
use crate::notification::{FeatureUpdate, UpdateSink};

/// Roadmap-feature counterpart of `ReviewManager`.
pub struct FeatureManager {
    registry: ActorRegistry<FeatureKey, FeatureMachine>,
    sink: Arc<dyn UpdateSink<FeatureUpdate>>,
}

impl FeatureManager {
    pub fn new(sink: Arc<dyn UpdateSink<FeatureUpdate>>) -> Self {
        Self {
            registry: ActorRegistry::new(FeatureContext::new),
            sink,
        }
    }

    pub fn start_generation(&self, project_id: &str, feature_id: &str) {
        self.send(project_id, feature_id, FeatureEvent::StartGeneration, true);
    }

    pub fn set_progress(&self, project_id: &str, feature_id: &str, progress: Progress) {
        self.send(project_id, feature_id, FeatureEvent::SetProgress(progress), false);
    }

    pub fn complete(&self, project_id: &str, feature_id: &str) {
        self.send(project_id, feature_id, FeatureEvent::Complete, false);
    }

    pub fn error(&self, project_id: &str, feature_id: &str, message: impl Into<String>) {
        self.send(project_id, feature_id, FeatureEvent::Fail(message.into()), false);
    }

    pub fn clear(&self, project_id: &str, feature_id: &str) {
        let key = FeatureKey::new(project_id, feature_id);
        if let Some(captured) = self.registry.take(&key) {
            self.sink.publish(FeatureUpdate::idle(&captured.context));
        }
    }

    pub fn auth_changed(&self) {
        for (_, captured) in self.registry.drain() {
            self.sink.publish(FeatureUpdate::idle(&captured.context));
        }
    }

    pub fn get_snapshot(
        &self,
        project_id: &str,
        feature_id: &str,
    ) -> Option<Snapshot<FeatureMachine>> {
        self.registry
            .snapshot(&FeatureKey::new(project_id, feature_id))
    }

    pub fn shutdown_all(&self) {
        self.registry.clear_all();
    }

    fn send(&self, project_id: &str, feature_id: &str, event: FeatureEvent, create: bool) {
        let key = FeatureKey::new(project_id, feature_id);
        if let Some(snapshot) = self.registry.send(&key, event, create) {
            self.sink
                .publish(FeatureUpdate::from_snapshot(snapshot.state, &snapshot.context));
        }
    }
}
