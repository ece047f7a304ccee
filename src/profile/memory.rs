use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{LimitType, Profile, ProfileDirectory, RateLimitEvent};
use crate::error::{Result, WardenError};

struct State {
    profiles: Vec<Profile>,
    active: String,
}

/// In-memory profile directory, primarily for tests. Multiple
/// independent instances behave deterministically; there is no shared
/// global state.
pub struct MemoryProfiles {
    state: Mutex<State>,
    refresh_calls: AtomicUsize,
}

impl MemoryProfiles {
    pub fn new(profiles: Vec<Profile>, active: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                profiles,
                active: active.into(),
            }),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn single(profile: Profile) -> Self {
        let active = profile.id.clone();
        Self::new(vec![profile], active)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn find(state: &State, id: &str) -> Result<Profile> {
        state
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| WardenError::UnknownProfile(id.to_string()))
    }
}

#[async_trait]
impl ProfileDirectory for MemoryProfiles {
    async fn active_profile(&self) -> Result<Profile> {
        let state = self.state.lock();
        Self::find(&state, &state.active)
    }

    async fn profile(&self, id: &str) -> Result<Profile> {
        Self::find(&self.state.lock(), id)
    }

    async fn set_active(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::find(&state, id)?;
        state.active = id.to_string();
        Ok(())
    }

    async fn record_rate_limit(
        &self,
        id: &str,
        limit_type: LimitType,
        reset_time: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| WardenError::UnknownProfile(id.to_string()))?;

        let now = Utc::now();
        profile.limited_until = Some(now + limit_type.cooldown());
        profile.last_rate_limit = Some(RateLimitEvent {
            at: now,
            limit_type,
            reset_time,
        });
        Ok(())
    }

    async fn best_available(&self) -> Result<Option<Profile>> {
        let state = self.state.lock();
        let now = Utc::now();
        Ok(state
            .profiles
            .iter()
            .find(|p| p.id != state.active && !p.is_limited(now))
            .cloned())
    }

    async fn refresh_usage(&self) -> Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
