//! Outbound state-change notifications and their delivery sinks.

mod events;
mod sink;

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

pub use events::{FeatureUpdate, ReviewUpdate, TaskRunUpdate};
pub use sink::{ChannelSink, CollectSink, LogSink, NullSink, UpdateSink};

use crate::config::NotificationConfig;

/// Sink selected by configuration: log echo when enabled, a discard
/// sink otherwise.
pub fn configured_sink<U>(config: &NotificationConfig) -> Arc<dyn UpdateSink<U>>
where
    U: Serialize + Debug + Send + Sync + 'static,
{
    if config.enabled && config.log_updates {
        Arc::new(LogSink)
    } else {
        Arc::new(NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_discards_updates() {
        let config = NotificationConfig {
            enabled: false,
            log_updates: true,
        };
        let sink: Arc<dyn UpdateSink<u32>> = configured_sink(&config);
        sink.publish(7);

        let config = NotificationConfig {
            enabled: true,
            log_updates: true,
        };
        let sink: Arc<dyn UpdateSink<u32>> = configured_sink(&config);
        sink.publish(7);
    }
}
