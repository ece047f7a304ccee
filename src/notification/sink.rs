use std::fmt::Debug;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Delivery target for state-change notifications.
///
/// `publish` is called from inside registry critical sections and must
/// return immediately; implementations may hand off but never block.
pub trait UpdateSink<U>: Send + Sync {
    fn publish(&self, update: U);
}

/// Echoes every update to the log as a single JSON line.
#[derive(Debug, Default)]
pub struct LogSink;

impl<U: Serialize + Debug> UpdateSink<U> for LogSink {
    fn publish(&self, update: U) {
        match serde_json::to_string(&update) {
            Ok(json) => info!(update = %json, "state change"),
            Err(_) => info!(?update, "state change"),
        }
    }
}

/// Forwards updates over an unbounded channel; sending never suspends.
/// A closed receiver is not an error, the update is simply dropped.
pub struct ChannelSink<U> {
    tx: mpsc::UnboundedSender<U>,
}

impl<U: Send> ChannelSink<U> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<U>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<U: Send + Sync> UpdateSink<U> for ChannelSink<U> {
    fn publish(&self, update: U) {
        if self.tx.send(update).is_err() {
            debug!("update receiver dropped, notification discarded");
        }
    }
}

/// Discards every update; used when notifications are disabled.
#[derive(Debug, Default)]
pub struct NullSink;

impl<U> UpdateSink<U> for NullSink {
    fn publish(&self, _update: U) {}
}

/// Test sink that records every published update.
#[derive(Default)]
pub struct CollectSink<U> {
    updates: Mutex<Vec<U>>,
}

impl<U: Clone> CollectSink<U> {
    pub fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updates(&self) -> Vec<U> {
        self.updates.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }
}

impl<U: Clone + Send + Sync> UpdateSink<U> for CollectSink<U> {
    fn publish(&self, update: U) {
        self.updates.lock().push(update);
    }
}
