//! `PostgreSQL` query executor for Tally.
//!
//! [`PostgresExecutor`] implements [`QueryExecutor`] over a `sqlx` connection
//! pool. Rows come back as JSON objects. Statements that produce rows
//! (`SELECT`, `WITH`, or anything with `RETURNING`) are wrapped so Postgres
//! renders each row with `to_jsonb`:
//!
//! ```text
//! WITH q AS (<statement>) SELECT to_jsonb(q) AS row FROM q
//! ```
//!
//! Other statements are executed and return no rows.
//!
//! # Parameters
//!
//! [`SqlValue::Null`] binds as an untyped text `NULL`. Statements should cast
//! nullable parameters explicitly (`$3::uuid`, `$4::timestamptz`).
//!
//! The schema lives in `schema.sql` at the crate root. Applying it is left to
//! the deployment.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use std::time::Duration;
use tally_core::query::{QueryError, QueryExecutor, QueryResult, SqlValue};
use tracing::{debug, info};

/// The schema the SQL store expects.
pub const SCHEMA: &str = include_str!("../schema.sql");

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// `postgres://` connection URL.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub connect_timeout: Duration,
}

impl PostgresConfig {
    /// Config with a 10-connection pool and 30 second timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// [`QueryExecutor`] backed by a `sqlx` Postgres pool.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects eagerly.
    ///
    /// # Errors
    ///
    /// [`QueryError::Connection`] when the database cannot be reached.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, QueryError> {
        let pool = pool_options(config)
            .connect(&config.url)
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Builds the pool without connecting; the first query opens a
    /// connection.
    ///
    /// # Errors
    ///
    /// [`QueryError::Connection`] when the URL cannot be parsed.
    pub fn connect_lazy(config: &PostgresConfig) -> Result<Self, QueryError> {
        let pool = pool_options(config)
            .connect_lazy(&config.url)
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn pool_options(config: &PostgresConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn query(&self, text: &str, params: &[SqlValue]) -> Result<QueryResult, QueryError> {
        if !returns_rows(text) {
            let statement = params
                .iter()
                .fold(sqlx::query(text), |query, value| bind(query, value));
            let outcome = statement.execute(&self.pool).await.map_err(map_error)?;
            debug!(rows_affected = outcome.rows_affected(), "Executed statement");
            return Ok(QueryResult::default());
        }

        let wrapped = wrap_for_json(text);
        let statement = params
            .iter()
            .fold(sqlx::query(&wrapped), |query, value| bind(query, value));
        let records = statement.fetch_all(&self.pool).await.map_err(map_error)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let value: Value = record.try_get("row").map_err(|e| QueryError::Decode {
                column: "row".to_string(),
                reason: e.to_string(),
            })?;
            match value {
                Value::Object(map) => rows.push(map),
                other => {
                    return Err(QueryError::Decode {
                        column: "row".to_string(),
                        reason: format!("expected JSON object, got {other}"),
                    });
                }
            }
        }
        debug!(rows = rows.len(), "Fetched rows");
        Ok(QueryResult::new(rows))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

/// Whether `text` produces a result set.
fn returns_rows(text: &str) -> bool {
    let upper = text.trim_start().to_ascii_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH") || upper.contains("RETURNING")
}

fn wrap_for_json(text: &str) -> String {
    let statement = text.trim().trim_end_matches(';');
    format!("WITH q AS ({statement}) SELECT to_jsonb(q) AS row FROM q")
}

fn map_error(error: sqlx::Error) -> QueryError {
    match error {
        sqlx::Error::PoolClosed => QueryError::Closed,
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            QueryError::Connection(error.to_string())
        }
        sqlx::Error::Database(db) => QueryError::Execution(db.message().to_string()),
        other => QueryError::Execution(other.to_string()),
    }
}
