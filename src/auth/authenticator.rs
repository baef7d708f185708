//! Session/lockout state machine for the admin dashboard
//!
//! ```text
//!                  success                        logout / deadline passed
//!  Unauthenticated ───────────────► Authenticated ─────────────────────────┐
//!     ▲   │  failure (< max)                                              │
//!     │   └──────────┐                                                    │
//!     │              ▼                                                    │
//!     │        Unauthenticated ◄──────────────────────────────────────────┘
//!     │   failure (== max)
//!     │        │
//!     │        ▼
//!     └──── LockedOut   (every attempt rejected unevaluated until unlock_at)
//!     lockout deadline passed
//! ```
//!
//! All state is written through to a [`KeyValueStore`] on every transition
//! and rehydrated by [`Authenticator::load`]. Store failures are logged and
//! never escape: an unreadable store loads as "not authenticated", and a
//! session that cannot be recorded is not started. Attempt and lockout
//! writes that fail leave the in-memory counters authoritative.

use crate::auth::clock::Clock;
use crate::auth::credential::{digest, digests_match, Credential, CredentialVerifier};
use crate::auth::models::{AuthEvent, AuthOutcome, AuthPhase, AuthState, SessionInfo, SessionMarker};
use crate::auth::persistence::{from_millis, StateRepository};
use crate::auth::policy::AuthPolicy;
use crate::auth::store::KeyValueStore;
use crate::error::{ErrorReporter, Result, SiteError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "authenticator";

#[derive(Debug, Clone)]
struct ActiveSession {
    token: String,
    deadline: DateTime<Utc>,
}

/// Admin authenticator
pub struct Authenticator {
    policy: AuthPolicy,
    verifier: CredentialVerifier,
    repo: StateRepository,
    clock: Arc<dyn Clock>,
    failed_attempts: u32,
    lockout_deadline: Option<DateTime<Utc>>,
    session: Option<ActiveSession>,
    /// Expiry warning already raised for the current deadline
    warned: bool,
}

impl Authenticator {
    /// Build an authenticator from whatever state the store holds
    pub fn load(
        policy: AuthPolicy,
        verifier: CredentialVerifier,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut authenticator = Self {
            policy,
            verifier,
            repo: StateRepository::new(store),
            clock,
            failed_attempts: 0,
            lockout_deadline: None,
            session: None,
            warned: false,
        };
        authenticator.rehydrate();
        authenticator
    }

    fn rehydrate(&mut self) {
        let now = self.clock.now();

        self.failed_attempts = self.repo.failed_attempts().unwrap_or_else(|e| {
            ErrorReporter::log_error(&e, COMPONENT, "rehydrate");
            0
        });
        self.lockout_deadline = self.repo.lockout_deadline().unwrap_or_else(|e| {
            ErrorReporter::log_error(&e, COMPONENT, "rehydrate");
            None
        });

        let marker = self.repo.session().unwrap_or_else(|e| {
            ErrorReporter::log_error(&e, COMPONENT, "rehydrate");
            None
        });
        if let Some(marker) = marker {
            match self.session_from_marker(&marker, now) {
                Some(session) => self.session = Some(session),
                None => {
                    debug!("Discarding stale session marker");
                    self.persist("rehydrate", |repo| repo.clear_session());
                }
            }
        }

        if self.active_lockout(now).is_some() {
            if self.session.take().is_some() {
                self.persist("rehydrate", |repo| repo.clear_session());
            }
        } else if self.lockout_deadline.is_some() {
            self.expire_lockout();
        }

        debug!(
            phase = ?self.phase(),
            failed_attempts = self.failed_attempts,
            "Authenticator state loaded"
        );
    }

    fn session_from_marker(&self, marker: &SessionMarker, now: DateTime<Utc>) -> Option<ActiveSession> {
        if !marker.authenticated || marker.token.is_empty() {
            return None;
        }
        let started = match from_millis(marker.timestamp) {
            Ok(started) => started,
            Err(e) => {
                ErrorReporter::log_error(&e, COMPONENT, "rehydrate");
                return None;
            }
        };
        let Some(deadline) = started.checked_add_signed(self.policy.session_span()) else {
            warn!(timestamp = marker.timestamp, "Session marker timestamp out of range");
            return None;
        };
        (now < deadline).then(|| ActiveSession {
            token: marker.token.clone(),
            deadline,
        })
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Snapshot of the state as of now
    pub fn state(&self) -> AuthState {
        let now = self.clock.now();
        let lockout = self.active_lockout(now);
        let session = self.active_session(now);
        let lockout_lapsed = lockout.is_none() && self.lockout_deadline.is_some();

        AuthState {
            authenticated: session.is_some(),
            failed_attempts: if lockout_lapsed { 0 } else { self.failed_attempts },
            locked_out: lockout.is_some(),
            lockout_deadline: lockout,
            session_deadline: session.map(|s| s.deadline),
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.state().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.active_session(self.clock.now()).is_some()
    }

    /// Attempts left before a lockout
    pub fn remaining_attempts(&self) -> u32 {
        self.policy
            .max_attempts
            .saturating_sub(self.state().failed_attempts)
    }

    /// Check a credential
    ///
    /// During a lockout the credential is not looked at.
    pub fn authenticate(&mut self, credential: &Credential) -> AuthOutcome {
        let now = self.clock.now();

        if let Some(unlock_at) = self.active_lockout(now) {
            warn!(%unlock_at, "Admin login rejected during lockout");
            return AuthOutcome::LockedOut { unlock_at };
        }
        self.expire_due(now);

        if self.verifier.verify(credential) {
            return self.start_session(now);
        }

        self.failed_attempts = self.failed_attempts.saturating_add(1);
        let attempts = self.failed_attempts;
        self.persist("authenticate", |repo| repo.save_failed_attempts(attempts));

        if attempts >= self.policy.max_attempts {
            let unlock_at = now + self.policy.lockout_span();
            self.lockout_deadline = Some(unlock_at);
            self.persist("authenticate", |repo| repo.save_lockout_deadline(unlock_at));
            if self.session.take().is_some() {
                self.persist("authenticate", |repo| repo.clear_session());
            }
            warn!(
                failed_attempts = attempts,
                %unlock_at,
                "Too many failed admin logins, locking out"
            );
            return AuthOutcome::LockedOut { unlock_at };
        }

        let remaining_attempts = self.policy.max_attempts - attempts;
        warn!(
            failed_attempts = attempts,
            remaining_attempts, "Invalid admin credential"
        );
        AuthOutcome::Failure { remaining_attempts }
    }

    fn start_session(&mut self, now: DateTime<Utc>) -> AuthOutcome {
        let token = Uuid::new_v4().simple().to_string();
        let deadline = now + self.policy.session_span();

        self.failed_attempts = 0;
        self.warned = false;
        self.persist("authenticate", |repo| repo.save_failed_attempts(0));

        let marker = SessionMarker {
            authenticated: true,
            timestamp: now.timestamp_millis(),
            token: token.clone(),
        };
        if let Err(e) = self.repo.save_session(&marker) {
            ErrorReporter::log_error(&e, COMPONENT, "authenticate");
            if self.session.take().is_some() {
                self.persist("authenticate", |repo| repo.clear_session());
            }
            return AuthOutcome::Unavailable;
        }
        self.session = Some(ActiveSession {
            token: token.clone(),
            deadline,
        });

        info!(expires_at = %deadline, "Admin authenticated");
        AuthOutcome::Success(SessionInfo {
            token,
            expires_at: deadline,
        })
    }

    /// End the session; safe to call when none exists
    pub fn logout(&mut self) {
        if self.session.take().is_some() {
            info!("Admin logged out");
        }
        self.warned = false;
        self.persist("logout", |repo| repo.clear_session());
    }

    /// Time until the lockout ends, zero when not locked out
    pub fn lockout_remaining(&self) -> Duration {
        let now = self.clock.now();
        self.active_lockout(now)
            .and_then(|deadline| (deadline - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Time until the session deadline, zero without a session
    pub fn remaining_session_time(&self) -> Duration {
        let now = self.clock.now();
        self.session
            .as_ref()
            .and_then(|s| (s.deadline - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Push the session deadline to now + session duration
    pub fn extend_session(&mut self) -> Result<SessionInfo> {
        let now = self.clock.now();
        if self.active_session(now).is_none() {
            self.expire_session();
            return Err(SiteError::SessionExpired);
        }

        let deadline = now + self.policy.session_span();
        let token = match self.session.as_mut() {
            Some(session) => {
                session.deadline = deadline;
                session.token.clone()
            }
            None => return Err(SiteError::SessionExpired),
        };
        self.warned = false;

        let marker = SessionMarker {
            authenticated: true,
            timestamp: now.timestamp_millis(),
            token: token.clone(),
        };
        self.persist("extend_session", |repo| repo.save_session(&marker));

        debug!(expires_at = %deadline, "Admin session extended");
        Ok(SessionInfo {
            token,
            expires_at: deadline,
        })
    }

    /// Check a bearer token against the active session
    pub fn validate_token(&mut self, token: &str) -> Result<SessionInfo> {
        let now = self.clock.now();
        let Some((expected, deadline)) = self
            .session
            .as_ref()
            .map(|s| (s.token.clone(), s.deadline))
        else {
            return Err(SiteError::SessionExpired);
        };

        if now >= deadline {
            self.expire_session();
            return Err(SiteError::SessionExpired);
        }
        if !digests_match(&digest(token), &digest(&expected)) {
            debug!("Rejected request with unknown session token");
            return Err(SiteError::authentication("invalid session token"));
        }

        Ok(SessionInfo {
            token: expected,
            expires_at: deadline,
        })
    }

    /// Re-evaluate deadlines against the clock
    pub fn tick(&mut self) -> Vec<AuthEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        if matches!(self.lockout_deadline, Some(deadline) if now >= deadline) {
            self.expire_lockout();
            events.push(AuthEvent::LockoutExpired);
        }

        match self.session.as_ref().map(|s| s.deadline) {
            Some(deadline) if now >= deadline => {
                self.expire_session();
                events.push(AuthEvent::SessionExpired);
            }
            Some(deadline) => {
                let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
                if !self.warned && remaining <= self.policy.warning_threshold {
                    self.warned = true;
                    events.push(AuthEvent::SessionExpiring { remaining });
                }
            }
            None => {}
        }

        events
    }

    /// Operator reset of the attempt counter and any lockout
    pub fn unlock(&mut self) {
        self.expire_lockout();
    }

    fn active_lockout(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lockout_deadline.filter(|deadline| now < *deadline)
    }

    fn active_session(&self, now: DateTime<Utc>) -> Option<&ActiveSession> {
        self.session.as_ref().filter(|s| now < s.deadline)
    }

    fn expire_due(&mut self, now: DateTime<Utc>) {
        if matches!(self.lockout_deadline, Some(deadline) if now >= deadline) {
            self.expire_lockout();
        }
        if matches!(self.session.as_ref(), Some(s) if now >= s.deadline) {
            self.expire_session();
        }
    }

    fn expire_lockout(&mut self) {
        if self.lockout_deadline.take().is_some() {
            info!("Admin lockout expired");
        }
        self.failed_attempts = 0;
        self.persist("expire_lockout", |repo| repo.clear_lockout());
    }

    fn expire_session(&mut self) {
        if self.session.take().is_some() {
            info!("Admin session expired, reauthentication required");
            self.warned = false;
            self.persist("expire_session", |repo| repo.clear_session());
        }
    }

    fn persist<F>(&self, operation: &str, write: F)
    where
        F: FnOnce(&StateRepository) -> Result<()>,
    {
        if let Err(e) = write(&self.repo) {
            ErrorReporter::log_error(&e, COMPONENT, operation);
        }
    }
}
