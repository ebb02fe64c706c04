//! Relational store client
//!
//! The migration pipeline only needs three operations from the relational
//! side: run a statement, check the catalog for a view, and read the
//! aggregate view. [`PgStore`] implements them on a `sqlx` Postgres pool;
//! [`MemoryStore`] keeps everything in memory for tests and examples.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Row returned by the aggregate view
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Key column value (customer id)
    pub key: String,
    /// Identity used by the document store
    pub identity: String,
    /// Aggregated points
    pub total: f64,
}

/// Aggregate view location and column names
#[derive(Debug, Clone)]
pub struct ViewRef {
    pub schema: String,
    pub name: String,
    pub key_column: String,
    pub identity_column: String,
    pub total_column: String,
}

impl ViewRef {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Statement failed: {0}")]
    Execute(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Relational store operations used by the toolbox
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Execute a single statement, returning affected rows
    async fn execute(&self, sql: &str) -> Result<u64, StoreError>;

    /// Whether a view exists in the catalog
    async fn view_exists(&self, schema: &str, name: &str) -> Result<bool, StoreError>;

    /// Read aggregate rows for the given keys
    async fn query_aggregate(
        &self,
        view: &ViewRef,
        keys: &[String],
    ) -> Result<Vec<AggregateRow>, StoreError>;
}

/// Postgres-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool. Failure here is fatal for the calling step.
    pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Connected to relational store");
        Ok(Self { pool })
    }
}

#[async_trait]
impl RelationalStore for PgStore {
    async fn execute(&self, sql: &str) -> Result<u64, StoreError> {
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Execute(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn view_exists(&self, schema: &str, name: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_views WHERE schemaname = $1 AND viewname = $2)",
        )
        .bind(schema)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        debug!("View {}.{} exists: {}", schema, name, exists);
        Ok(exists)
    }

    async fn query_aggregate(
        &self,
        view: &ViewRef,
        keys: &[String],
    ) -> Result<Vec<AggregateRow>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {key}::text, {identity}::text, {total}::float8 FROM {view} WHERE {key}::text = ANY($1) ORDER BY 1",
            key = view.key_column,
            identity = view.identity_column,
            total = view.total_column,
            view = view.qualified_name(),
        );

        let rows = sqlx::query(&sql)
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(AggregateRow {
                    key: row.try_get(0).map_err(|e| StoreError::Query(e.to_string()))?,
                    identity: row.try_get(1).map_err(|e| StoreError::Query(e.to_string()))?,
                    total: row
                        .try_get::<Option<f64>, _>(2)
                        .map_err(|e| StoreError::Query(e.to_string()))?
                        .unwrap_or(0.0),
                })
            })
            .collect()
    }
}

/// In-memory store
///
/// Statements are recorded instead of executed. A statement containing one
/// of the configured failure markers fails with [`StoreError::Execute`].
#[derive(Default)]
pub struct MemoryStore {
    executed: Mutex<Vec<String>>,
    views: Mutex<HashSet<String>>,
    rows: BTreeMap<String, AggregateRow>,
    failure_markers: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row served by `query_aggregate`
    pub fn with_row(mut self, key: &str, identity: &str, total: f64) -> Self {
        self.rows.insert(
            key.to_string(),
            AggregateRow {
                key: key.to_string(),
                identity: identity.to_string(),
                total,
            },
        );
        self
    }

    /// Register an existing view
    pub fn with_view(self, schema: &str, name: &str) -> Self {
        self.views.lock().insert(format!("{}.{}", schema, name).to_lowercase());
        self
    }

    /// Fail every statement containing `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.failure_markers.push(marker.to_string());
        self
    }

    /// Statements executed so far
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn execute(&self, sql: &str) -> Result<u64, StoreError> {
        if let Some(marker) = self.failure_markers.iter().find(|m| sql.contains(m.as_str())) {
            return Err(StoreError::Execute(format!("rejected statement containing '{}'", marker)));
        }

        let normalized = sql.trim_start().to_uppercase();
        if let Some(rest) = normalized.strip_prefix("CREATE VIEW ") {
            if let Some(name) = rest.split_whitespace().next() {
                self.views.lock().insert(name.to_lowercase());
            }
        }

        self.executed.lock().push(sql.to_string());
        Ok(1)
    }

    async fn view_exists(&self, schema: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.views.lock().contains(&format!("{}.{}", schema, name).to_lowercase()))
    }

    async fn query_aggregate(
        &self,
        _view: &ViewRef,
        keys: &[String],
    ) -> Result<Vec<AggregateRow>, StoreError> {
        Ok(keys.iter().filter_map(|k| self.rows.get(k).cloned()).collect())
    }
}
