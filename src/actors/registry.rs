use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::machines::Lifecycle;

/// The only externally observable shape of an actor.
pub struct Snapshot<M: Lifecycle> {
    pub state: M::State,
    pub context: M::Context,
}

impl<M: Lifecycle> Clone for Snapshot<M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            context: self.context.clone(),
        }
    }
}

impl<M: Lifecycle> std::fmt::Debug for Snapshot<M>
where
    M::Context: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("state", &self.state)
            .field("context", &self.context)
            .finish()
    }
}

/// One running machine instance bound to a key: an explicit
/// `{state, context}` pair rather than closures over hidden mutable
/// state.
struct Actor<M: Lifecycle> {
    state: M::State,
    context: M::Context,
}

struct Inner<K, M: Lifecycle> {
    actors: HashMap<K, Actor<M>>,
    /// Last emitted fingerprint per key; an unchanged fingerprint
    /// suppresses the outbound notification.
    fingerprints: HashMap<K, String>,
}

/// Owns one actor per key and routes events to it.
///
/// All mutation happens inside synchronous critical sections with no
/// await points, which preserves the single-threaded execution model:
/// a transition runs to completion before the next event is processed.
pub struct ActorRegistry<K, M: Lifecycle> {
    inner: Mutex<Inner<K, M>>,
    make_context: Box<dyn Fn(&K) -> M::Context + Send + Sync>,
}

impl<K, M> ActorRegistry<K, M>
where
    K: Eq + Hash + Clone,
    M: Lifecycle,
{
    pub fn new(make_context: impl Fn(&K) -> M::Context + Send + Sync + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                actors: HashMap::new(),
                fingerprints: HashMap::new(),
            }),
            make_context: Box::new(make_context),
        }
    }

    /// Feed an event to the actor for `key`.
    ///
    /// When `create` is set a missing actor is instantiated at its
    /// initial state first; lifecycle-starting events pass `true`,
    /// everything else is a no-op against an absent actor.
    ///
    /// Returns the new snapshot only when the event applied AND the
    /// dedup fingerprint changed, i.e. exactly when a notification is
    /// due. A no-op event or an unchanged fingerprint returns `None`.
    pub fn send(&self, key: &K, event: M::Event, create: bool) -> Option<Snapshot<M>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let actor = match inner.actors.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if !create {
                    return None;
                }
                entry.insert(Actor {
                    state: M::initial_state(),
                    context: (self.make_context)(key),
                })
            }
        };

        let (state, context) = M::apply(actor.state, &actor.context, event)?;
        actor.state = state;
        actor.context = context.clone();

        let fingerprint = M::fingerprint(state, &context);
        let changed = inner.fingerprints.get(key) != Some(&fingerprint);
        if changed {
            inner.fingerprints.insert(key.clone(), fingerprint);
            Some(Snapshot { state, context })
        } else {
            None
        }
    }

    pub fn snapshot(&self, key: &K) -> Option<Snapshot<M>> {
        let inner = self.inner.lock();
        inner.actors.get(key).map(|actor| Snapshot {
            state: actor.state,
            context: actor.context.clone(),
        })
    }

    /// Stop and remove the actor for `key`, returning the captured
    /// pre-teardown snapshot. The fingerprint cache entry goes with it
    /// so a later re-created actor notifies from a clean slate.
    pub fn take(&self, key: &K) -> Option<Snapshot<M>> {
        let mut inner = self.inner.lock();
        let actor = inner.actors.remove(key)?;
        inner.fingerprints.remove(key);
        Some(Snapshot {
            state: actor.state,
            context: actor.context,
        })
    }

    /// Tear down every actor in one pass, returning the captured
    /// snapshots. Registry and fingerprint cache end up empty; nothing
    /// can interleave because the whole sweep happens under one lock.
    pub fn drain(&self) -> Vec<(K, Snapshot<M>)> {
        let mut inner = self.inner.lock();
        inner.fingerprints.clear();
        inner
            .actors
            .drain()
            .map(|(key, actor)| {
                (
                    key,
                    Snapshot {
                        state: actor.state,
                        context: actor.context,
                    },
                )
            })
            .collect()
    }

    /// Drop all actors without capturing snapshots (process shutdown).
    pub fn clear_all(&self) {
        let mut inner = self.inner.lock();
        inner.actors.clear();
        inner.fingerprints.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().actors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{Progress, ReviewContext, ReviewEvent, ReviewKey, ReviewMachine};

    fn registry() -> ActorRegistry<ReviewKey, ReviewMachine> {
        ActorRegistry::new(ReviewContext::new)
    }

    #[test]
    fn test_send_without_create_is_noop_for_absent_actor() {
        let registry = registry();
        let key = ReviewKey::new("p1", 1);
        assert!(registry
            .send(&key, ReviewEvent::SetProgress(Progress::phase("x")), false)
            .is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_start_emits_once() {
        let registry = registry();
        let key = ReviewKey::new("p1", 1);

        assert!(registry.send(&key, ReviewEvent::StartReview, true).is_some());
        // Second start is undefined for Reviewing and must stay silent.
        assert!(registry.send(&key, ReviewEvent::StartReview, true).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identical_progress_deduplicated() {
        let registry = registry();
        let key = ReviewKey::new("p1", 1);
        registry.send(&key, ReviewEvent::StartReview, true);

        let progress = Progress::phase("analyzing").with_percent(50);
        assert!(registry
            .send(&key, ReviewEvent::SetProgress(progress.clone()), false)
            .is_some());
        assert!(registry
            .send(&key, ReviewEvent::SetProgress(progress), false)
            .is_none());
        assert!(registry
            .send(
                &key,
                ReviewEvent::SetProgress(Progress::phase("analyzing").with_percent(51)),
                false
            )
            .is_some());
    }

    #[test]
    fn test_take_clears_fingerprint_cache() {
        let registry = registry();
        let key = ReviewKey::new("p1", 1);
        registry.send(&key, ReviewEvent::StartReview, true);

        let captured = registry.take(&key).unwrap();
        assert_eq!(captured.context.project_id, "p1");
        assert!(registry.snapshot(&key).is_none());

        // A fresh actor notifies again even though the snapshot looks the
        // same as the torn-down one did.
        assert!(registry.send(&key, ReviewEvent::StartReview, true).is_some());
    }
}
