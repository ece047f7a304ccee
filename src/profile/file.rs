use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::{LimitType, Profile, ProfileDirectory, RateLimitEvent};
use crate::error::{Result, WardenError};
use crate::utils::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileDocument {
    active: String,
    profiles: Vec<Profile>,
}

/// JSON-file-backed profile directory, stored under the project state
/// dir. Every mutation is a load-modify-save with an atomic write, so a
/// crash never leaves a torn document.
pub struct ProfileFile {
    path: PathBuf,
}

impl ProfileFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn init(&self, profiles: Vec<Profile>, active: &str) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&ProfileDocument {
            active: active.to_string(),
            profiles,
        })
        .await
    }

    async fn load(&self) -> Result<ProfileDocument> {
        if !self.path.exists() {
            return Err(WardenError::Profile(format!(
                "profile store missing: {}",
                self.path.display()
            )));
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, document: &ProfileDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(document)?;
        write_atomic(&self.path, &content).await
    }

    fn find(document: &ProfileDocument, id: &str) -> Result<Profile> {
        document
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| WardenError::UnknownProfile(id.to_string()))
    }
}

#[async_trait]
impl ProfileDirectory for ProfileFile {
    async fn active_profile(&self) -> Result<Profile> {
        let document = self.load().await?;
        Self::find(&document, &document.active)
    }

    async fn profile(&self, id: &str) -> Result<Profile> {
        Self::find(&self.load().await?, id)
    }

    async fn set_active(&self, id: &str) -> Result<()> {
        let mut document = self.load().await?;
        Self::find(&document, id)?;
        document.active = id.to_string();
        debug!(profile = id, "active profile updated");
        self.save(&document).await
    }

    async fn record_rate_limit(
        &self,
        id: &str,
        limit_type: LimitType,
        reset_time: Option<String>,
    ) -> Result<()> {
        let mut document = self.load().await?;
        let profile = document
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
        self.save(&document).await
    }

    async fn best_available(&self) -> Result<Option<Profile>> {
        let document = self.load().await?;
        let now = Utc::now();
        Ok(document
            .profiles
            .iter()
            .find(|p| p.id != document.active && !p.is_limited(now))
            .cloned())
    }

    async fn refresh_usage(&self) -> Result<()> {
        // Usage accounting lives with the external profile service; the
        // file store has nothing to refresh.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_swap_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        let store = ProfileFile::new(path.clone());
        store
            .init(vec![Profile::new("a"), Profile::new("b")], "a")
            .await
            .unwrap();
        store.set_active("b").await.unwrap();

        let reopened = ProfileFile::new(path);
        assert_eq!(reopened.active_profile().await.unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_rate_limit_recorded_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileFile::new(dir.path().join("profiles.json"));
        store.init(vec![Profile::new("a")], "a").await.unwrap();

        store
            .record_rate_limit("a", LimitType::Weekly, None)
            .await
            .unwrap();

        let profile = store.profile("a").await.unwrap();
        assert_eq!(
            profile.last_rate_limit.unwrap().limit_type,
            LimitType::Weekly
        );
    }
}
