//! Table-oriented storage behind the content services
//!
//! The content services only need row-level CRUD with equality filters and a
//! single ordering column over named tables, the contract offered by hosted
//! database services. Rows travel as JSON objects.

use crate::error::{Result, SiteError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One table row
pub type Row = Map<String, Value>;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering column and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub direction: Direction,
}

impl OrderBy {
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            direction: Direction::Ascending,
        }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            direction: Direction::Descending,
        }
    }
}

/// Row selection: equality filters, optional order, optional limit
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(&'static str, Value)>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push((column, value.into()));
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a row satisfies every filter
    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(*column).map_or(expected.is_null(), |v| loosely_equal(v, expected)))
    }
}

/// Hosted table service contract
#[async_trait]
pub trait ContentBackend: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// Insert a row; returns it as stored
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Apply `changes` to the row with `id`; `None` if no such row
    async fn update(&self, table: &str, id: &str, changes: Row) -> Result<Option<Row>>;

    /// Delete the row with `id`; `false` if no such row
    async fn delete(&self, table: &str, id: &str) -> Result<bool>;
}

/// In-process backend (tests and local development)
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the service were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(SiteError::service_unavailable("content backend offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentBackend for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(order.column).unwrap_or(&Value::Null),
                    b.get(order.column).unwrap_or(&Value::Null),
                );
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        debug!(table, rows = rows.len(), "Memory backend select");
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        self.check_available()?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SiteError::invalid_input("row is missing an id"))?
            .to_string();

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str())) {
            return Err(SiteError::invalid_input(format!("duplicate id {id} in {table}")));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, changes: Row) -> Result<Option<Row>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.get("id").and_then(Value::as_str) == Some(id)))
        else {
            return Ok(None);
        };

        for (column, value) in changes {
            row.insert(column, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        Ok(rows.len() != before)
    }
}

/// Equality that treats `true`/`1` and `false`/`0` alike, as SQL backends do
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_i64() == Some(i64::from(*b))
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// Total order over JSON scalars; nulls sort first
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
