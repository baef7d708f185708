//! Admin dashboard endpoints: login/session handling and content management

use crate::auth::{AuthOutcome, AuthPhase, Credential, SessionInfo};
use crate::content::{ContentKind, Row};
use crate::error::{Result, SiteError};
use crate::http_transport::session_middleware::bearer_token;
use crate::http_transport::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// `POST /admin/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(credential): Json<Credential>,
) -> Response {
    let delay = state.authenticator.lock().await.policy().attempt_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (outcome, retry_after) = {
        let mut auth = state.authenticator.lock().await;
        let outcome = auth.authenticate(&credential);
        (outcome, auth.lockout_remaining())
    };
    match &outcome {
        AuthOutcome::Success(_) => (StatusCode::OK, Json(outcome)).into_response(),
        AuthOutcome::Failure { remaining_attempts } => {
            warn!(remaining_attempts, "Admin login rejected");
            (StatusCode::UNAUTHORIZED, Json(outcome)).into_response()
        }
        AuthOutcome::LockedOut { .. } => (
            StatusCode::LOCKED,
            [(header::RETRY_AFTER, retry_seconds(retry_after).to_string())],
            Json(outcome),
        )
            .into_response(),
        AuthOutcome::Unavailable => {
            warn!("Admin login accepted but the session could not be stored");
            (StatusCode::SERVICE_UNAVAILABLE, Json(outcome)).into_response()
        }
    }
}

/// Whole seconds, rounded up so clients never retry early
fn retry_seconds(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

/// `POST /admin/logout`: idempotent, but a live session is only ended by
/// its own token
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut auth = state.authenticator.lock().await;
    match bearer_token(&headers) {
        Some(token) => match auth.validate_token(token) {
            Ok(_) => auth.logout(),
            Err(SiteError::SessionExpired) => {}
            Err(e) => return e.into_response(),
        },
        None if auth.is_authenticated() => return SiteError::SessionExpired.into_response(),
        None => {}
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub phase: AuthPhase,
    pub authenticated: bool,
    pub remaining_seconds: u64,
    pub expires_at: Option<DateTime<Utc>>,
    /// Inside the warning threshold; the dashboard offers to extend
    pub expiring_soon: bool,
    pub remaining_attempts: u32,
    pub unlock_at: Option<DateTime<Utc>>,
}

/// `GET /admin/session`
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let mut auth = state.authenticator.lock().await;
    let session = bearer_token(&headers).and_then(|token| auth.validate_token(token).ok());
    let snapshot = auth.state();

    let status = match session {
        Some(session) => {
            let remaining = auth.remaining_session_time();
            SessionStatus {
                phase: AuthPhase::Authenticated,
                authenticated: true,
                remaining_seconds: remaining.as_secs(),
                expires_at: Some(session.expires_at),
                expiring_soon: remaining <= auth.policy().warning_threshold,
                remaining_attempts: auth.remaining_attempts(),
                unlock_at: None,
            }
        }
        None => SessionStatus {
            phase: if snapshot.locked_out {
                AuthPhase::LockedOut
            } else {
                AuthPhase::Unauthenticated
            },
            authenticated: false,
            remaining_seconds: 0,
            expires_at: None,
            expiring_soon: false,
            remaining_attempts: auth.remaining_attempts(),
            unlock_at: snapshot.lockout_deadline.filter(|_| snapshot.locked_out),
        },
    };
    Json(status)
}

/// `POST /admin/session/extend` (behind the session guard)
pub async fn extend_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionInfo>> {
    let session = state.authenticator.lock().await.extend_session()?;
    Ok(Json(session))
}

/// `GET /admin/api/:kind`: drafts included
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Value>>> {
    let kind: ContentKind = kind.parse()?;
    Ok(Json(state.content.collection(kind).list_all_json().await?))
}

/// `GET /admin/api/:kind/:id`
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let kind: ContentKind = kind.parse()?;
    state
        .content
        .collection(kind)
        .get_json(&id, false)
        .await?
        .map(Json)
        .ok_or_else(|| SiteError::not_found(format!("{kind} '{id}'")))
}

/// `POST /admin/api/:kind`
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(fields): Json<Row>,
) -> Result<(StatusCode, Json<Value>)> {
    let kind: ContentKind = kind.parse()?;
    let created = state.content.collection(kind).create_json(fields).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /admin/api/:kind/:id`
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(changes): Json<Row>,
) -> Result<Json<Value>> {
    let kind: ContentKind = kind.parse()?;
    Ok(Json(
        state.content.collection(kind).update_json(&id, changes).await?,
    ))
}

/// `DELETE /admin/api/:kind/:id`
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let kind: ContentKind = kind.parse()?;
    state.content.collection(kind).delete(&id).await?;
    info!(%kind, id, "Admin deleted content");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/api/:kind/:id/toggle/:field`
pub async fn toggle_field(
    State(state): State<Arc<AppState>>,
    Path((kind, id, field)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let kind: ContentKind = kind.parse()?;
    Ok(Json(
        state.content.collection(kind).toggle_json(&id, &field).await?,
    ))
}
