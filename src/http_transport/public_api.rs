//! Read-only content endpoints for the public pages

use crate::content::ContentKind;
use crate::error::{Result, SiteError};
use crate::http_transport::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// `GET /api/:kind`: published entries in listing order
pub async fn list_published(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Value>>> {
    let kind: ContentKind = kind.parse()?;
    let entries = state.content.collection(kind).list_published_json().await?;
    Ok(Json(entries))
}

/// `GET /api/:kind/:key`: one published entry by slug or id
pub async fn get_published(
    State(state): State<Arc<AppState>>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let kind: ContentKind = kind.parse()?;
    state
        .content
        .collection(kind)
        .get_json(&key, true)
        .await?
        .map(Json)
        .ok_or_else(|| SiteError::not_found(format!("{kind} '{key}'")))
}
