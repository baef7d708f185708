//! Turso (libSQL) content backend
//!
//! Supports a hosted database (`libsql://` with a token), an embedded replica
//! synced from it, or a local file. Tables are created on connect. Values
//! are always bound positionally; table and column names are checked against
//! a strict identifier pattern before they reach SQL text.

use crate::config::DatabaseConfig;
use crate::content::backend::{ContentBackend, Direction, Query, Row};
use crate::content::models::ContentKind;
use crate::error::{Result, SiteError};
use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Connection, Database};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_]+$").expect("identifier pattern is valid"));

pub struct TursoBackend {
    database: Arc<Database>,
    connection: Arc<RwLock<Connection>>,
    replica: bool,
}

impl TursoBackend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        info!("Connecting content backend to {}", config.url);

        let (database, replica) = if config.is_remote() {
            match &config.local_replica {
                Some(path) => {
                    let db = libsql::Builder::new_remote_replica(
                        path,
                        config.url.clone(),
                        config.auth_token.clone(),
                    )
                    .build()
                    .await
                    .map_err(|e| SiteError::database(format!("Failed to open replica: {e}")))?;
                    (db, true)
                }
                None => {
                    let db = libsql::Builder::new_remote(config.url.clone(), config.auth_token.clone())
                        .build()
                        .await
                        .map_err(|e| SiteError::database(format!("Failed to connect to Turso: {e}")))?;
                    (db, false)
                }
            }
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            let db = libsql::Builder::new_local(path)
                .build()
                .await
                .map_err(|e| SiteError::database(format!("Failed to open local database: {e}")))?;
            (db, false)
        };

        let connection = database
            .connect()
            .map_err(|e| SiteError::database(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            database: Arc::new(database),
            connection: Arc::new(RwLock::new(connection)),
            replica,
        };
        backend.sync().await?;
        backend.initialize_schema().await?;
        Ok(backend)
    }

    /// Pull from the hosted database when running as an embedded replica
    pub async fn sync(&self) -> Result<()> {
        if !self.replica {
            return Ok(());
        }
        debug!("Syncing content replica");
        self.database
            .sync()
            .await
            .map_err(|e| SiteError::database(format!("Replica sync failed: {e}")))?;
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection.write().await;
        for kind in ContentKind::ALL {
            conn.execute(&kind.ddl(), ()).await.map_err(|e| {
                SiteError::database(format!("Failed to create {kind} table: {e}"))
            })?;
        }
        info!("Content schema initialized");
        Ok(())
    }

    async fn query_rows(&self, sql: &str, params: Vec<libsql::Value>) -> Result<Vec<Row>> {
        debug!(sql, "Executing content query");
        let conn = self.connection.read().await;
        let mut rows = conn
            .query(sql, Params::Positional(params))
            .await
            .map_err(|e| SiteError::database(format!("Failed to execute query: {e}")))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| SiteError::database(format!("Failed to fetch row: {e}")))?
        {
            let mut decoded = Row::new();
            for index in 0..row.column_count() {
                let name = row.column_name(index).unwrap_or_default().to_string();
                let value = row
                    .get_value(index)
                    .map_err(|e| SiteError::database(format!("Failed to get {name}: {e}")))?;
                decoded.insert(name, from_sql(value));
            }
            results.push(decoded);
        }
        Ok(results)
    }
}

#[async_trait]
impl ContentBackend for TursoBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let (sql, params) = select_sql(table, query)?;
        self.query_rows(&sql, params).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let (sql, params) = insert_sql(table, &row)?;
        self.query_rows(&sql, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SiteError::database(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: &str, id: &str, changes: Row) -> Result<Option<Row>> {
        if changes.is_empty() {
            return Ok(self
                .select(table, &Query::new().eq("id", id.to_string()).limit(1))
                .await?
                .into_iter()
                .next());
        }
        let (sql, params) = update_sql(table, id, &changes)?;
        Ok(self.query_rows(&sql, params).await?.into_iter().next())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        check_identifier(table)?;
        let conn = self.connection.write().await;
        let affected = conn
            .execute(
                &format!("DELETE FROM {table} WHERE id = ?1"),
                Params::Positional(vec![libsql::Value::Text(id.to_string())]),
            )
            .await
            .map_err(|e| SiteError::database(format!("Failed to delete from {table}: {e}")))?;
        Ok(affected > 0)
    }
}

fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SiteError::invalid_input(format!("invalid identifier '{name}'")))
    }
}

fn select_sql(table: &str, query: &Query) -> Result<(String, Vec<libsql::Value>)> {
    check_identifier(table)?;
    let mut sql = format!("SELECT * FROM {table}");
    let mut params = Vec::with_capacity(query.filters.len());

    for (i, (column, value)) in query.filters.iter().enumerate() {
        check_identifier(column)?;
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        if value.is_null() {
            sql.push_str(&format!("{column} IS NULL"));
        } else {
            params.push(to_sql(value));
            sql.push_str(&format!("{column} = ?{}", params.len()));
        }
    }

    if let Some(order) = query.order {
        check_identifier(order.column)?;
        let direction = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {} {direction}", order.column));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok((sql, params))
}

fn insert_sql(table: &str, row: &Row) -> Result<(String, Vec<libsql::Value>)> {
    check_identifier(table)?;
    let mut columns = Vec::with_capacity(row.len());
    let mut placeholders = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (column, value) in row {
        check_identifier(column)?;
        columns.push(column.as_str());
        params.push(to_sql(value));
        placeholders.push(format!("?{}", params.len()));
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok((sql, params))
}

fn update_sql(table: &str, id: &str, changes: &Row) -> Result<(String, Vec<libsql::Value>)> {
    check_identifier(table)?;
    let mut assignments = Vec::with_capacity(changes.len());
    let mut params = Vec::with_capacity(changes.len() + 1);
    for (column, value) in changes {
        check_identifier(column)?;
        params.push(to_sql(value));
        assignments.push(format!("{column} = ?{}", params.len()));
    }
    params.push(libsql::Value::Text(id.to_string()));
    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?{} RETURNING *",
        assignments.join(", "),
        params.len()
    );
    Ok((sql, params))
}

/// JSON to SQLite storage class; arrays and objects become JSON text
fn to_sql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => libsql::Value::Integer(i),
            None => libsql::Value::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => libsql::Value::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => libsql::Value::Text(value.to_string()),
    }
}

fn from_sql(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Number(i.into()),
        libsql::Value::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::backend::OrderBy;
    use serde_json::json;

    #[test]
    fn test_select_sql_binds_values() {
        let query = Query::new()
            .eq("published", true)
            .eq("slug", "hello")
            .order(OrderBy::desc("created_at"))
            .limit(1);
        let (sql, params) = select_sql("projects", &query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM projects WHERE published = ?1 AND slug = ?2 ORDER BY created_at DESC LIMIT 1"
        );
        assert_eq!(params.len(), 2);
        assert!(matches!(params[0], libsql::Value::Integer(1)));
    }

    #[test]
    fn test_identifiers_are_checked() {
        let mut row = Row::new();
        row.insert("name; DROP TABLE partners".to_string(), json!("x"));
        assert!(insert_sql("partners", &row).is_err());
        assert!(select_sql("Partners", &Query::new()).is_err());
    }

    #[test]
    fn test_update_sql_puts_id_last() {
        let mut changes = Row::new();
        changes.insert("published".to_string(), json!(false));
        let (sql, params) = update_sql("reviews", "r1", &changes).unwrap();
        assert_eq!(
            sql,
            "UPDATE reviews SET published = ?1 WHERE id = ?2 RETURNING *"
        );
        assert!(matches!(&params[1], libsql::Value::Text(id) if id == "r1"));
    }

    #[tokio::test]
    async fn test_local_database_round_trip() {
        let config = DatabaseConfig {
            url: ":memory:".to_string(),
            ..Default::default()
        };
        let backend = TursoBackend::connect(&config).await.unwrap();

        let row = json!({
            "id": "p1",
            "name": "Acme",
            "published": true,
            "display_order": 2,
            "created_at": "2024-03-01T10:00:00.000Z",
            "updated_at": "2024-03-01T10:00:00.000Z",
        });
        backend
            .insert("partners", row.as_object().cloned().unwrap())
            .await
            .unwrap();

        let rows = backend
            .select("partners", &Query::new().eq("published", true))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["published"], json!(1));
        assert_eq!(rows[0]["logo_url"], Value::Null);

        assert!(backend.delete("partners", "p1").await.unwrap());
        assert!(!backend.delete("partners", "p1").await.unwrap());
    }
}
