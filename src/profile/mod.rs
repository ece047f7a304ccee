//! Credential profiles and the directory collaborator that owns the
//! active-profile pointer.
//!
//! The directory is injected wherever profile state is consulted, so
//! tests run against independent in-memory instances instead of a
//! process-global singleton.

mod file;
mod memory;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use file::ProfileFile;
pub use memory::MemoryProfiles;

use crate::error::Result;

/// Environment variable the agent subprocess reads for a config-dir
/// override.
pub const ENV_CONFIG_DIR: &str = "AGENT_CONFIG_DIR";
/// Environment variable carrying a pinned API token.
pub const ENV_API_TOKEN: &str = "AGENT_API_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Session,
    Weekly,
}

impl LimitType {
    /// How long a profile sits out after hitting this kind of limit.
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::Session => Duration::hours(5),
            Self::Weekly => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitEvent {
    pub at: DateTime<Utc>,
    pub limit_type: LimitType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

/// A named credential/account context for the agent subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rate_limit: Option<RateLimitEvent>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            config_dir: None,
            token: None,
            limited_until: None,
            last_rate_limit: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn is_limited(&self, now: DateTime<Utc>) -> bool {
        self.limited_until.is_some_and(|until| until > now)
    }

    /// Subprocess environment for this profile.
    ///
    /// A config-dir override wins outright: any pinned token is dropped
    /// so the subprocess reads fresh credentials from the directory
    /// instead of a stale cached one.
    pub fn env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let Some(dir) = &self.config_dir {
            env.insert(ENV_CONFIG_DIR.to_string(), dir.display().to_string());
        } else if let Some(token) = &self.token {
            env.insert(ENV_API_TOKEN.to_string(), token.clone());
        }
        env
    }
}

/// The profile collaborator. `set_active` is the single point of truth
/// for swaps; nothing else writes the active pointer.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn active_profile(&self) -> Result<Profile>;

    async fn profile(&self, id: &str) -> Result<Profile>;

    async fn set_active(&self, id: &str) -> Result<()>;

    async fn record_rate_limit(
        &self,
        id: &str,
        limit_type: LimitType,
        reset_time: Option<String>,
    ) -> Result<()>;

    /// Best alternative to the active profile, i.e. the first profile
    /// that is not the active one and not currently limited.
    async fn best_available(&self) -> Result<Option<Profile>>;

    /// Best-effort usage refresh, fired detached after a swap.
    async fn refresh_usage(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_override_drops_pinned_token() {
        let profile = Profile::new("work")
            .with_token("sk-stale")
            .with_config_dir("/home/u/.agent-work");

        let env = profile.env();
        assert!(env.contains_key(ENV_CONFIG_DIR));
        assert!(!env.contains_key(ENV_API_TOKEN));
    }

    #[test]
    fn test_token_env_without_override() {
        let env = Profile::new("work").with_token("sk-live").env();
        assert_eq!(env.get(ENV_API_TOKEN).map(String::as_str), Some("sk-live"));
        assert!(!env.contains_key(ENV_CONFIG_DIR));
    }

    #[test]
    fn test_limited_until_window() {
        let mut profile = Profile::new("work");
        let now = Utc::now();
        assert!(!profile.is_limited(now));

        profile.limited_until = Some(now + LimitType::Session.cooldown());
        assert!(profile.is_limited(now));
        assert!(!profile.is_limited(now + Duration::hours(6)));
    }
}
