//! CRUD service for one content collection
//!
//! Every operation goes straight to the backend. Backend failures are logged
//! and surfaced as [`SiteError::ServiceUnavailable`] so callers can offer a
//! retry; nothing is retried automatically.

use crate::auth::clock::{Clock, SystemClock};
use crate::content::backend::{ContentBackend, Query, Row};
use crate::content::models::{format_timestamp, ContentEntity};
use crate::content::slug::{is_valid_slug, slugify};
use crate::error::{ErrorReporter, Result, SiteError};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "content";

/// Columns the service owns; caller-supplied values are ignored
const MANAGED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub struct ContentService<E: ContentEntity> {
    backend: Arc<dyn ContentBackend>,
    clock: Arc<dyn Clock>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: ContentEntity> Clone for ContentService<E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            clock: self.clock.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: ContentEntity> ContentService<E> {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn ContentBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            _entity: PhantomData,
        }
    }

    /// Every row, drafts included
    pub async fn list_all(&self) -> Result<Vec<E>> {
        self.select("list_all", Query::new().order(E::ORDER)).await
    }

    /// Published rows only, in listing order
    pub async fn list_published(&self) -> Result<Vec<E>> {
        self.select(
            "list_published",
            Query::new().eq("published", true).order(E::ORDER),
        )
        .await
    }

    /// Look up by slug first (for entities that have one), then by id
    pub async fn get_by_slug_or_id(&self, key: &str) -> Result<Option<E>> {
        if E::SLUG_SOURCE.is_some() {
            let by_slug = self
                .select("get_by_slug", Query::new().eq("slug", key).limit(1))
                .await?;
            if let Some(found) = by_slug.into_iter().next() {
                return Ok(Some(found));
            }
        }
        self.get_by_id(key).await
    }

    pub async fn create(&self, fields: Row) -> Result<E> {
        let mut row = fields;
        for column in MANAGED_COLUMNS {
            row.remove(column);
        }

        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(&self.clock.now());
        row.insert("id".to_string(), Value::String(id.clone()));
        row.insert("created_at".to_string(), Value::String(now.clone()));
        row.insert("updated_at".to_string(), Value::String(now));

        if let Some(source) = E::SLUG_SOURCE {
            let slug = self.assign_slug(&row, source, &id, None).await?;
            row.insert("slug".to_string(), Value::String(slug));
        }

        let entity = Self::parse(row)?;
        let stored = self
            .backend
            .insert(E::TABLE, to_row(&entity)?)
            .await
            .map_err(|e| backend_failure(e, "create"))?;

        info!(kind = %E::KIND, id = %entity.id(), "Content created");
        self.decode(stored)
    }

    /// Apply a partial update; `id` cannot change
    pub async fn update(&self, id: &str, changes: Row) -> Result<E> {
        let mut changes = changes;
        if let Some(requested) = changes.remove("id") {
            if requested.as_str() != Some(id) {
                return Err(SiteError::invalid_input("id cannot be changed"));
            }
        }
        changes.remove("created_at");
        changes.remove("updated_at");

        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| SiteError::not_found(format!("{} {id} not found", E::KIND)))?;

        let mut merged = to_row(&existing)?;
        for (column, value) in &changes {
            merged.insert(column.clone(), value.clone());
        }

        if let Some(source) = E::SLUG_SOURCE {
            if let Some(slug) = changes.get("slug") {
                if slug.as_str() != Some(existing_slug(&existing)?.as_str()) {
                    let slug = self.assign_slug(&merged, source, id, Some(id)).await?;
                    merged.insert("slug".to_string(), Value::String(slug));
                }
            }
        }

        let now = format_timestamp(&self.clock.now());
        merged.insert("updated_at".to_string(), Value::String(now));
        let entity = Self::parse(merged)?;

        // Only send the columns that were asked to change
        let normalized = to_row(&entity)?;
        let patch: Row = normalized
            .into_iter()
            .filter(|(column, _)| changes.contains_key(column) || column == "updated_at")
            .collect();

        let updated = self
            .backend
            .update(E::TABLE, id, patch)
            .await
            .map_err(|e| backend_failure(e, "update"))?
            .ok_or_else(|| SiteError::not_found(format!("{} {id} not found", E::KIND)))?;

        debug!(kind = %E::KIND, id, "Content updated");
        self.decode(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self
            .backend
            .delete(E::TABLE, id)
            .await
            .map_err(|e| backend_failure(e, "delete"))?;
        if !removed {
            return Err(SiteError::not_found(format!("{} {id} not found", E::KIND)));
        }
        info!(kind = %E::KIND, id, "Content deleted");
        Ok(())
    }

    /// Flip one of the entity's boolean columns
    pub async fn toggle_field(&self, id: &str, field: &str) -> Result<E> {
        if !E::BOOLEAN_FIELDS.contains(&field) {
            return Err(SiteError::invalid_input(format!(
                "{field} is not a toggleable field of {}",
                E::KIND
            )));
        }

        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| SiteError::not_found(format!("{} {id} not found", E::KIND)))?;
        let current = to_row(&existing)?
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut changes = Row::new();
        changes.insert(field.to_string(), Value::Bool(!current));
        self.update(id, changes).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<E>> {
        let rows = self
            .select("get_by_id", Query::new().eq("id", id.to_string()).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn select(&self, operation: &str, query: Query) -> Result<Vec<E>> {
        let rows = self
            .backend
            .select(E::TABLE, &query)
            .await
            .map_err(|e| backend_failure(e, operation))?;
        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    /// Unique slug from `row[source]`, or the caller's explicit slug
    async fn assign_slug(
        &self,
        row: &Row,
        source: &str,
        id: &str,
        exclude_id: Option<&str>,
    ) -> Result<String> {
        let explicit = row
            .get("slug")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        let base = match explicit {
            Some(slug) if !is_valid_slug(slug) => {
                return Err(SiteError::invalid_input(format!("invalid slug '{slug}'")));
            }
            Some(slug) => slug.to_string(),
            None => {
                let title = row.get(source).and_then(Value::as_str).unwrap_or_default();
                let derived = slugify(title);
                if derived.is_empty() {
                    id.chars().take(8).collect()
                } else {
                    derived
                }
            }
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        loop {
            let taken = self
                .backend
                .select(E::TABLE, &Query::new().eq("slug", candidate.clone()))
                .await
                .map_err(|e| backend_failure(e, "assign_slug"))?
                .iter()
                .any(|r| r.get("id").and_then(Value::as_str) != exclude_id);
            if !taken {
                return Ok(candidate);
            }
            if explicit.is_some() {
                return Err(SiteError::invalid_input(format!(
                    "slug '{candidate}' is already in use"
                )));
            }
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
    }

    fn parse(row: Row) -> Result<E> {
        let entity: E = serde_json::from_value(Value::Object(row))
            .map_err(|e| SiteError::invalid_input(format!("invalid {}: {e}", E::KIND)))?;
        entity.validate()?;
        Ok(entity)
    }

    /// Backend row to entity; SQL backends hand back 0/1 and JSON text
    fn decode(&self, mut row: Row) -> Result<E> {
        for field in E::BOOLEAN_FIELDS {
            if let Some(Value::Number(n)) = row.get(*field) {
                let flag = n.as_i64().unwrap_or(0) != 0;
                row.insert((*field).to_string(), Value::Bool(flag));
            }
        }
        for field in E::JSON_FIELDS {
            if let Some(Value::String(raw)) = row.get(*field) {
                let parsed = serde_json::from_str(raw).unwrap_or_else(|e| {
                    warn!(kind = %E::KIND, field, error = %e, "Discarding malformed JSON column");
                    Value::Array(Vec::new())
                });
                row.insert((*field).to_string(), parsed);
            }
        }

        serde_json::from_value(Value::Object(row)).map_err(|e| {
            let error = SiteError::database(format!("malformed {} row: {e}", E::KIND));
            ErrorReporter::log_error(&error, COMPONENT, "decode");
            SiteError::service_unavailable(format!("{} could not be loaded", E::KIND))
        })
    }
}

fn existing_slug<E: ContentEntity>(entity: &E) -> Result<String> {
    Ok(to_row(entity)?
        .get("slug")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn to_row<E: ContentEntity>(entity: &E) -> Result<Row> {
    match serde_json::to_value(entity)? {
        Value::Object(row) => Ok(row),
        _ => Err(SiteError::invalid_input("entity did not serialize to an object")),
    }
}

/// Caller mistakes pass through; everything else becomes retryable
fn backend_failure(error: SiteError, operation: &str) -> SiteError {
    match error {
        SiteError::InvalidInput(_) | SiteError::NotFound(_) => error,
        other => {
            ErrorReporter::log_error(&other, COMPONENT, operation);
            SiteError::service_unavailable(format!("content service unavailable during {operation}"))
        }
    }
}
