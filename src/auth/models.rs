//! Authenticator state and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse authenticator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Unauthenticated,
    Authenticated,
    LockedOut,
}

/// Snapshot of the authenticator state, evaluated at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    /// An unexpired session exists
    pub authenticated: bool,

    /// Consecutive failures since the last success or lockout expiry
    pub failed_attempts: u32,

    /// `lockout_deadline` is set and still in the future
    pub locked_out: bool,

    pub lockout_deadline: Option<DateTime<Utc>>,

    pub session_deadline: Option<DateTime<Utc>>,
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        if self.locked_out {
            AuthPhase::LockedOut
        } else if self.authenticated {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        }
    }
}

/// Issued session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Bearer token the admin client presents on each request
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of an `authenticate` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthOutcome {
    /// Credential accepted, session started
    Success(SessionInfo),
    /// Credential rejected
    Failure { remaining_attempts: u32 },
    /// Rejected without evaluating the credential
    LockedOut { unlock_at: DateTime<Utc> },
    /// Credential accepted but the session could not be recorded
    Unavailable,
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success(_))
    }
}

/// Timed transitions observed by `tick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Lockout window over, attempts reset
    LockoutExpired,
    /// Session deadline passed, reauthentication required
    SessionExpired,
    /// Session will expire soon; raised once per deadline
    SessionExpiring {
        #[serde(with = "humantime_serde")]
        remaining: Duration,
    },
}

/// Persisted form of an active session
///
/// `timestamp` is the epoch-ms of login or last extension; the session is
/// valid until `timestamp + session_duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub authenticated: bool,
    pub timestamp: i64,
    #[serde(default)]
    pub token: String,
}
