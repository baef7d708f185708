//! Attempt, lockout, and session timing policy

use crate::error::{Result, SiteError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest duration any policy window may take
const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Authenticator policy
///
/// One policy guards the admin surface. Deployments that want the stricter
/// username/password variant set `max_attempts = 3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthPolicy {
    /// Consecutive failures that trigger a lockout
    pub max_attempts: u32,

    /// How long a lockout lasts
    #[serde(with = "humantime_serde")]
    pub lockout_duration: Duration,

    /// How long a session stays valid after login or extension
    #[serde(with = "humantime_serde")]
    pub session_duration: Duration,

    /// Remaining session time at which the expiry prompt is raised
    #[serde(with = "humantime_serde")]
    pub warning_threshold: Duration,

    /// Period of the expiry re-check
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Delay applied to each login response
    #[serde(with = "humantime_serde")]
    pub attempt_delay: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::from_secs(15 * 60),
            session_duration: Duration::from_secs(30 * 60),
            warning_threshold: Duration::from_secs(5 * 60),
            tick_interval: Duration::from_secs(1),
            attempt_delay: Duration::from_millis(500),
        }
    }
}

impl AuthPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SiteError::config("auth.max_attempts must be at least 1"));
        }
        for (name, value) in [
            ("auth.lockout_duration", self.lockout_duration),
            ("auth.session_duration", self.session_duration),
            ("auth.tick_interval", self.tick_interval),
        ] {
            if value.is_zero() {
                return Err(SiteError::config(format!("{name} must be non-zero")));
            }
            if value > MAX_WINDOW {
                return Err(SiteError::config(format!("{name} must not exceed one year")));
            }
        }
        if self.warning_threshold >= self.session_duration {
            return Err(SiteError::config(
                "auth.warning_threshold must be shorter than auth.session_duration",
            ));
        }
        Ok(())
    }

    pub(crate) fn lockout_span(&self) -> chrono::Duration {
        span(self.lockout_duration)
    }

    pub(crate) fn session_span(&self) -> chrono::Duration {
        span(self.session_duration)
    }
}

fn span(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MAX_WINDOW)).unwrap_or_else(|_| chrono::Duration::days(365))
}
