//! Admin authentication
//!
//! A single configured credential guards the admin dashboard. The
//! [`Authenticator`] tracks failed attempts, lockout windows, and the
//! session deadline, persisting all of it through an injected
//! [`KeyValueStore`]. A [`SessionTicker`] re-checks the deadlines on a fixed
//! period and publishes [`AuthEvent`]s.

pub mod authenticator;
pub mod clock;
pub mod credential;
pub mod models;
pub mod persistence;
pub mod policy;
pub mod store;
pub mod ticker;

pub use authenticator::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{Credential, CredentialVerifier};
pub use models::{AuthEvent, AuthOutcome, AuthPhase, AuthState, SessionInfo, SessionMarker};
pub use persistence::StateRepository;
pub use policy::AuthPolicy;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use ticker::{SessionTicker, SharedAuthenticator};

use crate::config::ServerConfig;
use crate::error::{ErrorReporter, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Build the shared authenticator described by the configuration
pub fn initialize_auth_system(config: &ServerConfig) -> Result<SharedAuthenticator> {
    config.auth.validate()?;
    config.credential.validate()?;

    // An unusable state file must not keep the site from starting
    let store: Arc<dyn KeyValueStore> = match FileStore::open(&config.state.path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            ErrorReporter::log_error(&e, "auth", "initialize");
            warn!("Admin state is kept in memory until the state file is repaired");
            Arc::new(MemoryStore::new())
        }
    };

    let authenticator = Authenticator::load(
        config.auth.clone(),
        CredentialVerifier::from_config(&config.credential),
        store,
        Arc::new(SystemClock),
    );
    Ok(Arc::new(Mutex::new(authenticator)))
}
