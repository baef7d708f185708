//! Test fixtures and utilities for consistent test setup
//!
//! Provides a virtual-clock authenticator harness and, with the
//! `http-server` feature, a fully wired router over in-memory backends.

use rapidx_site::auth::{
    Authenticator, AuthPolicy, CredentialVerifier, KeyValueStore, ManualClock, MemoryStore,
};
use rapidx_site::config::{CredentialConfig, CredentialMode};
use rstest::*;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_PIN: &str = "482913";
pub const WRONG_PIN: &str = "000000";

/// Default policy without the artificial attempt delay
#[fixture]
pub fn test_policy(#[default(5)] max_attempts: u32) -> AuthPolicy {
    AuthPolicy {
        max_attempts,
        attempt_delay: Duration::ZERO,
        ..AuthPolicy::default()
    }
}

pub fn pin_verifier() -> CredentialVerifier {
    CredentialVerifier::from_config(&CredentialConfig {
        mode: CredentialMode::Pin,
        username: None,
        secret: TEST_PIN.to_string(),
    })
}

/// Authenticator inputs that survive a simulated reload
pub struct AuthHarness {
    pub policy: AuthPolicy,
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn KeyValueStore>,
}

impl AuthHarness {
    pub fn new(policy: AuthPolicy, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            policy,
            clock: Arc::new(ManualClock::default()),
            store,
        }
    }

    /// Build an authenticator as a fresh process would
    pub fn load(&self) -> Authenticator {
        Authenticator::load(
            self.policy.clone(),
            pin_verifier(),
            self.store.clone(),
            self.clock.clone(),
        )
    }
}

#[fixture]
pub fn auth_harness(test_policy: AuthPolicy) -> AuthHarness {
    AuthHarness::new(test_policy, Arc::new(MemoryStore::new()))
}

#[cfg(feature = "http-server")]
pub use http::*;

#[cfg(feature = "http-server")]
mod http {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, Response};
    use axum::Router;
    use rapidx_site::config::NetworkConfig;
    use rapidx_site::content::{ContentHub, MemoryBackend};
    use rapidx_site::http_transport::{create_router, AppState};
    use serde_json::Value;
    use tokio::sync::Mutex;

    pub struct TestApp {
        pub router: Router,
        pub clock: Arc<ManualClock>,
        pub backend: Arc<MemoryBackend>,
        pub store: Arc<MemoryStore>,
    }

    impl TestApp {
        pub fn new(policy: AuthPolicy) -> Self {
            let store = Arc::new(MemoryStore::new());
            let harness = AuthHarness::new(policy, store.clone());
            let backend = Arc::new(MemoryBackend::new());
            let state = AppState {
                authenticator: Arc::new(Mutex::new(harness.load())),
                content: ContentHub::with_clock(backend.clone(), harness.clock.clone()),
            };
            Self {
                router: create_router(Arc::new(state), &NetworkConfig::default()),
                clock: harness.clock,
                backend,
                store,
            }
        }

        /// Send one request through the router
        pub async fn request(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response<Body> {
            use tower::ServiceExt;

            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.router.clone().oneshot(request).await.unwrap()
        }

        /// Log in with the test PIN and return the session token
        pub async fn login(&self) -> String {
            let response = self
                .request(
                    Method::POST,
                    "/admin/login",
                    None,
                    Some(serde_json::json!({ "pin": TEST_PIN })),
                )
                .await;
            assert_eq!(response.status(), 200);
            json_body(response).await["token"]
                .as_str()
                .unwrap()
                .to_string()
        }
    }

    pub async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&bytes).unwrap()
    }
}
