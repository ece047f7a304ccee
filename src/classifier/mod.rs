//! Rate-limit and auth-failure classification over agent output.
//!
//! Both detectors are pattern scans over the combined stdout+stderr of
//! a finished subprocess. Rate-limit detection is authoritative when
//! both could match; `detect_auth_failure` always confirms the
//! rate-limit verdict is negative first. That ordering is frozen.

mod patterns;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::profile::{LimitType, ProfileDirectory};

pub use patterns::AuthFailureType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitVerdict {
    pub is_rate_limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<LimitType>,
    pub profile_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_profile: Option<String>,
}

impl RateLimitVerdict {
    fn negative(profile_id: String) -> Self {
        Self {
            is_rate_limited: false,
            reset_time: None,
            limit_type: None,
            profile_id,
            suggested_profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailureVerdict {
    pub is_auth_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<AuthFailureType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub profile_id: String,
}

impl AuthFailureVerdict {
    fn negative(profile_id: String) -> Self {
        Self {
            is_auth_failure: false,
            failure_type: None,
            message: None,
            profile_id,
        }
    }
}

/// Result of `best_available_env`: the environment the next subprocess
/// should run with, and whether/why the active profile was swapped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSwap {
    pub env: HashMap<String, String>,
    pub profile_id: String,
    pub swapped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct OutputClassifier {
    directory: Arc<dyn ProfileDirectory>,
    auto_swap: bool,
}

impl OutputClassifier {
    pub fn new(directory: Arc<dyn ProfileDirectory>, auto_swap: bool) -> Self {
        Self {
            directory,
            auto_swap,
        }
    }

    pub fn from_config(
        directory: Arc<dyn ProfileDirectory>,
        config: &crate::config::ClassifierConfig,
    ) -> Self {
        Self::new(directory, config.auto_swap_profiles)
    }

    async fn resolve_profile(&self, profile_id: Option<&str>) -> Result<String> {
        match profile_id {
            Some(id) => Ok(id.to_string()),
            None => Ok(self.directory.active_profile().await?.id),
        }
    }

    /// Classify a capacity limit in subprocess output.
    ///
    /// The precise reset-phrase pattern is tried first; when it matches,
    /// the event is recorded against the resolved profile and the best
    /// alternative is suggested. Looser indicators still classify as
    /// rate-limited, just without reset-time detail. No match is a
    /// negative verdict, never an error.
    pub async fn detect_rate_limit(
        &self,
        text: &str,
        profile_id: Option<&str>,
    ) -> Result<RateLimitVerdict> {
        let profile_id = self.resolve_profile(profile_id).await?;

        let (limit_type, reset_time) = if let Some(phrase) = patterns::reset_phrase(text) {
            let limit_type = if patterns::is_weekly_phrase(&phrase) {
                LimitType::Weekly
            } else {
                LimitType::Session
            };
            (limit_type, Some(phrase))
        } else if patterns::has_rate_limit_indicator(text) {
            (LimitType::Session, None)
        } else {
            return Ok(RateLimitVerdict::negative(profile_id));
        };

        debug!(profile = %profile_id, ?limit_type, "rate limit detected");
        self.directory
            .record_rate_limit(&profile_id, limit_type, reset_time.clone())
            .await?;
        let suggested_profile = self.directory.best_available().await?.map(|p| p.id);

        Ok(RateLimitVerdict {
            is_rate_limited: true,
            reset_time,
            limit_type: Some(limit_type),
            profile_id,
            suggested_profile,
        })
    }

    /// Classify a credential failure in subprocess output.
    ///
    /// Rate-limit takes precedence: text matching both classifications
    /// yields a negative auth verdict.
    pub async fn detect_auth_failure(
        &self,
        text: &str,
        profile_id: Option<&str>,
    ) -> Result<AuthFailureVerdict> {
        let rate_limit = self.detect_rate_limit(text, profile_id).await?;
        if rate_limit.is_rate_limited {
            return Ok(AuthFailureVerdict::negative(rate_limit.profile_id));
        }

        let Some(failure_type) = patterns::auth_failure_type(text) else {
            return Ok(AuthFailureVerdict::negative(rate_limit.profile_id));
        };

        debug!(profile = %rate_limit.profile_id, ?failure_type, "auth failure detected");
        Ok(AuthFailureVerdict {
            is_auth_failure: true,
            message: Some(failure_type.user_message().to_string()),
            failure_type: Some(failure_type),
            profile_id: rate_limit.profile_id,
        })
    }

    /// Environment for the next subprocess, swapping the active profile
    /// away from a rate-limited one when possible.
    ///
    /// The swap is persisted through the directory's active-profile
    /// pointer, then a usage refresh is fired as a detached task that is
    /// never awaited; its failures are only logged.
    pub async fn best_available_env(&self) -> Result<ProfileSwap> {
        let active = self.directory.active_profile().await?;
        let now = chrono::Utc::now();

        if !active.is_limited(now) || !self.auto_swap {
            return Ok(ProfileSwap {
                env: active.env(),
                profile_id: active.id,
                swapped: false,
                reason: None,
            });
        }

        let Some(alternative) = self.directory.best_available().await? else {
            return Ok(ProfileSwap {
                env: active.env(),
                profile_id: active.id,
                swapped: false,
                reason: Some("active profile is rate-limited but no alternative is available".to_string()),
            });
        };

        self.directory.set_active(&alternative.id).await?;
        info!(
            from = %active.id,
            to = %alternative.id,
            "swapped away from rate-limited profile"
        );

        let directory = Arc::clone(&self.directory);
        tokio::spawn(async move {
            if let Err(e) = directory.refresh_usage().await {
                warn!(error = %e, "usage refresh after profile swap failed");
            }
        });

        Ok(ProfileSwap {
            env: alternative.env(),
            profile_id: alternative.id,
            swapped: true,
            reason: Some(format!("profile {} is rate-limited", active.id)),
        })
    }
}
