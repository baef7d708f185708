//! HTTP surface of the site service
//!
//! Public content is served under `/api`, the admin login and session
//! endpoints under `/admin`, and the content-management API under
//! `/admin/api` behind the session guard.

pub mod admin_api;
pub mod public_api;
pub mod session_middleware;

use crate::auth::SharedAuthenticator;
use crate::config::NetworkConfig;
use crate::content::ContentHub;
use crate::error::{Result, SiteError};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state
pub struct AppState {
    pub authenticator: SharedAuthenticator,
    pub content: ContentHub,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

/// Health check endpoint
async fn health_check(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Build the full router over `state`
pub fn create_router(state: Arc<AppState>, network: &NetworkConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/:kind", get(public_api::list_published))
        .route("/api/:kind/:key", get(public_api::get_published))
        .route("/admin/login", post(admin_api::login))
        .route("/admin/logout", post(admin_api::logout))
        .route("/admin/session", get(admin_api::session_status));

    let protected_routes = Router::new()
        .route("/admin/session/extend", post(admin_api::extend_session))
        .route(
            "/admin/api/:kind",
            get(admin_api::list_all).post(admin_api::create_entry),
        )
        .route(
            "/admin/api/:kind/:id",
            get(admin_api::get_entry)
                .patch(admin_api::update_entry)
                .delete(admin_api::delete_entry),
        )
        .route(
            "/admin/api/:kind/:id/toggle/:field",
            post(admin_api::toggle_field),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_middleware::require_session,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    match cors_layer(&network.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// CORS for the configured dashboard origins; none configured means same-origin only
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([header::RETRY_AFTER]),
    )
}

/// HTTP server bound to the configured address
pub struct HttpTransportServer {
    network: NetworkConfig,
    state: Arc<AppState>,
}

impl HttpTransportServer {
    pub fn new(network: NetworkConfig, state: AppState) -> Self {
        Self {
            network,
            state: Arc::new(state),
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), &self.network)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let address = format!("{}:{}", self.network.host, self.network.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            SiteError::service_unavailable(format!("Failed to bind to {address}: {e}"))
        })?;

        info!("🌐 Site server listening on http://{address}");
        info!("🏥 Health check: http://{address}/health");
        info!("🔐 Admin login: POST http://{address}/admin/login");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| SiteError::service_unavailable(format!("HTTP server error: {e}")))?;

        info!("Site server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_requires_valid_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
        assert!(cors_layer(&["https://admin.rapidxsolution.com".to_string()]).is_some());
    }
}
