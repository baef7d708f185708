//! Mapping between authenticator fields and store keys

use crate::auth::models::SessionMarker;
use crate::auth::store::KeyValueStore;
use crate::error::{Result, SiteError};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

/// Session marker, JSON `{authenticated, timestamp, token}`
pub const SESSION_KEY: &str = "rapidx.admin.session";
/// Failed attempt counter, stringified integer
pub const FAILED_ATTEMPTS_KEY: &str = "rapidx.admin.failed_attempts";
/// Lockout deadline, stringified epoch-ms
pub const LOCKOUT_KEY: &str = "rapidx.admin.lockout_until";

/// Typed access to the persisted authenticator fields
#[derive(Clone)]
pub struct StateRepository {
    store: Arc<dyn KeyValueStore>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn failed_attempts(&self) -> Result<u32> {
        match self.store.get(FAILED_ATTEMPTS_KEY)? {
            Some(raw) => raw.trim().parse().map_err(|_| {
                SiteError::store_unavailable(format!("Corrupt attempt counter: {raw:?}"))
            }),
            None => Ok(0),
        }
    }

    pub fn save_failed_attempts(&self, attempts: u32) -> Result<()> {
        if attempts == 0 {
            self.store.remove(FAILED_ATTEMPTS_KEY)
        } else {
            self.store.set(FAILED_ATTEMPTS_KEY, &attempts.to_string())
        }
    }

    pub fn lockout_deadline(&self) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(LOCKOUT_KEY)? {
            Some(raw) => {
                let millis: i64 = raw.trim().parse().map_err(|_| {
                    SiteError::store_unavailable(format!("Corrupt lockout deadline: {raw:?}"))
                })?;
                Ok(Some(from_millis(millis)?))
            }
            None => Ok(None),
        }
    }

    pub fn save_lockout_deadline(&self, deadline: DateTime<Utc>) -> Result<()> {
        self.store
            .set(LOCKOUT_KEY, &deadline.timestamp_millis().to_string())
    }

    /// Clear the attempt counter and lockout deadline
    pub fn clear_lockout(&self) -> Result<()> {
        self.store.remove(LOCKOUT_KEY)?;
        self.store.remove(FAILED_ATTEMPTS_KEY)
    }

    pub fn session(&self) -> Result<Option<SessionMarker>> {
        match self.store.get(SESSION_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                SiteError::store_unavailable(format!("Corrupt session marker: {e}"))
            }),
            None => Ok(None),
        }
    }

    pub fn save_session(&self, marker: &SessionMarker) -> Result<()> {
        self.store.set(SESSION_KEY, &serde_json::to_string(marker)?)
    }

    pub fn clear_session(&self) -> Result<()> {
        self.store.remove(SESSION_KEY)
    }
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| SiteError::store_unavailable(format!("Timestamp out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;

    #[test]
    fn test_lockout_deadline_is_epoch_millis() {
        let store = Arc::new(MemoryStore::new());
        let repo = StateRepository::new(store.clone());
        let deadline = Utc.timestamp_millis_opt(1_700_000_900_000).unwrap();

        repo.save_lockout_deadline(deadline).unwrap();
        assert_eq!(
            store.get(LOCKOUT_KEY).unwrap().as_deref(),
            Some("1700000900000")
        );
        assert_eq!(repo.lockout_deadline().unwrap(), Some(deadline));
    }

    #[test]
    fn test_corrupt_counter_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.set(FAILED_ATTEMPTS_KEY, "three").unwrap();
        let repo = StateRepository::new(store);
        assert!(matches!(
            repo.failed_attempts(),
            Err(SiteError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_zero_attempts_removes_key() {
        let store = Arc::new(MemoryStore::new());
        let repo = StateRepository::new(store.clone());
        repo.save_failed_attempts(2).unwrap();
        repo.save_failed_attempts(0).unwrap();
        assert_eq!(store.get(FAILED_ATTEMPTS_KEY).unwrap(), None);
    }
}
