//! Bearer-token guard for the admin content API

use crate::auth::SessionInfo;
use crate::error::{Result, SiteError};
use crate::http_transport::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate the request's token against the active session
pub async fn current_session(state: &AppState, headers: &HeaderMap) -> Result<SessionInfo> {
    let token = bearer_token(headers).ok_or(SiteError::SessionExpired)?;
    state.authenticator.lock().await.validate_token(token)
}

/// Reject requests without a live session; the session is added to the
/// request extensions for handlers that want it
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = current_session(&state, request.headers()).await;
    match session {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Admin request without a valid session");
            // Unknown and stale tokens look the same to the client
            SiteError::SessionExpired.into_response()
        }
    }
}
