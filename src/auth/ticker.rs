//! Periodic deadline re-check for a shared authenticator

use crate::auth::authenticator::Authenticator;
use crate::auth::models::AuthEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Authenticator shared between request handlers and the ticker
pub type SharedAuthenticator = Arc<Mutex<Authenticator>>;

const EVENT_CAPACITY: usize = 16;

/// Cancellable repeating task calling [`Authenticator::tick`]
///
/// Events are published on a broadcast channel. Dropping the ticker cancels
/// the task.
pub struct SessionTicker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionTicker {
    pub fn spawn(authenticator: SharedAuthenticator, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let task_cancel = cancel.clone();
        let task_events = events.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Session ticker shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let fired = authenticator.lock().await.tick();
                        for event in fired {
                            trace!(?event, "Session ticker event");
                            // No subscribers is fine
                            let _ = task_events.send(event);
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Stop ticking; the task exits at its next await point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
