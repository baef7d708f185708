//! Site content: portfolio projects, blog posts, client reviews, and partners
//!
//! Each collection is a [`ContentService`] over a shared [`ContentBackend`].
//! [`ContentHub`] groups the four and dispatches JSON-level calls by
//! [`ContentKind`] for the HTTP layer.

pub mod backend;
pub mod models;
pub mod service;
pub mod slug;
#[cfg(feature = "turso")]
pub mod turso;

pub use backend::{ContentBackend, Direction, MemoryBackend, OrderBy, Query, Row};
pub use models::{BlogPost, ContentEntity, ContentKind, Partner, Project, Review};
pub use service::ContentService;
pub use slug::slugify;
#[cfg(feature = "turso")]
pub use turso::TursoBackend;

use crate::auth::clock::{Clock, SystemClock};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Kind-erased view of a [`ContentService`]
#[async_trait]
pub trait ContentCollection: Send + Sync {
    fn kind(&self) -> ContentKind;

    async fn list_all_json(&self) -> Result<Vec<Value>>;

    async fn list_published_json(&self) -> Result<Vec<Value>>;

    /// Slug or id lookup; drafts are hidden when `published_only` is set
    async fn get_json(&self, key: &str, published_only: bool) -> Result<Option<Value>>;

    async fn create_json(&self, fields: Row) -> Result<Value>;

    async fn update_json(&self, id: &str, changes: Row) -> Result<Value>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn toggle_json(&self, id: &str, field: &str) -> Result<Value>;
}

#[async_trait]
impl<E: ContentEntity> ContentCollection for ContentService<E> {
    fn kind(&self) -> ContentKind {
        E::KIND
    }

    async fn list_all_json(&self) -> Result<Vec<Value>> {
        to_values(self.list_all().await?)
    }

    async fn list_published_json(&self) -> Result<Vec<Value>> {
        to_values(self.list_published().await?)
    }

    async fn get_json(&self, key: &str, published_only: bool) -> Result<Option<Value>> {
        match self.get_by_slug_or_id(key).await? {
            Some(entity) if !published_only || entity.is_published() => {
                Ok(Some(serde_json::to_value(entity)?))
            }
            _ => Ok(None),
        }
    }

    async fn create_json(&self, fields: Row) -> Result<Value> {
        Ok(serde_json::to_value(self.create(fields).await?)?)
    }

    async fn update_json(&self, id: &str, changes: Row) -> Result<Value> {
        Ok(serde_json::to_value(self.update(id, changes).await?)?)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        ContentService::delete(self, id).await
    }

    async fn toggle_json(&self, id: &str, field: &str) -> Result<Value> {
        Ok(serde_json::to_value(self.toggle_field(id, field).await?)?)
    }
}

fn to_values<E: ContentEntity>(entities: Vec<E>) -> Result<Vec<Value>> {
    entities
        .into_iter()
        .map(|e| serde_json::to_value(e).map_err(Into::into))
        .collect()
}

/// The four content services over one backend
#[derive(Clone)]
pub struct ContentHub {
    pub projects: ContentService<Project>,
    pub blog: ContentService<BlogPost>,
    pub reviews: ContentService<Review>,
    pub partners: ContentService<Partner>,
}

impl ContentHub {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn ContentBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            projects: ContentService::with_clock(backend.clone(), clock.clone()),
            blog: ContentService::with_clock(backend.clone(), clock.clone()),
            reviews: ContentService::with_clock(backend.clone(), clock.clone()),
            partners: ContentService::with_clock(backend, clock),
        }
    }

    pub fn collection(&self, kind: ContentKind) -> &dyn ContentCollection {
        match kind {
            ContentKind::Projects => &self.projects,
            ContentKind::Blog => &self.blog,
            ContentKind::Reviews => &self.reviews,
            ContentKind::Partners => &self.partners,
        }
    }
}
