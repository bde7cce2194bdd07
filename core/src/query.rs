//! Query executor contract.
//!
//! The storage layer talks to the database through [`QueryExecutor`]: a
//! parameterized statement in, JSON-object rows out. Postgres placeholders
//! (`$1`, `$2`, ...) are used throughout.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by a [`QueryExecutor`].
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// Could not reach the database.
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// The database rejected or failed the statement.
    #[error("Query failed: {0}")]
    Execution(String),

    /// A row did not have the expected shape.
    #[error("Failed to decode column '{column}': {reason}")]
    Decode {
        /// Column name.
        column: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The executor has been closed.
    #[error("Query executor is closed")]
    Closed,
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! id_params {
    ($($id:ty),*) => {
        $(
            impl From<$id> for SqlValue {
                fn from(value: $id) -> Self {
                    Self::Uuid(*value.as_uuid())
                }
            }
        )*
    };
}

id_params!(
    crate::types::UserId,
    crate::types::ActivityId,
    crate::types::LogId,
    crate::types::GoalId,
    crate::types::AchievementId,
    crate::types::NotificationId
);

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Rows returned by a statement. Statements without a result set return no
/// rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows in database order.
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Wraps rows.
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// The first row, if any.
    #[must_use]
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

/// Runs parameterized statements.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `text` with `params` bound to `$1..$n`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the statement cannot be executed.
    async fn query(&self, text: &str, params: &[SqlValue]) -> Result<QueryResult, QueryError>;

    /// Releases connections. Later queries fail with [`QueryError::Closed`].
    async fn close(&self) {}
}

/// Typed column access on a [`Row`].
pub trait RowExt {
    /// Raw column value; missing columns read as `null`.
    fn value(&self, column: &str) -> &Value;

    /// Required text column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or not a string.
    fn text(&self, column: &str) -> Result<String, QueryError> {
        self.value(column)
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| decode_error(column, "expected text"))
    }

    /// Nullable text column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when present but not a string.
    fn opt_text(&self, column: &str) -> Result<Option<String>, QueryError> {
        match self.value(column) {
            Value::Null => Ok(None),
            _ => self.text(column).map(Some),
        }
    }

    /// Required UUID column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or not a UUID.
    fn uuid(&self, column: &str) -> Result<Uuid, QueryError> {
        let raw = self.text(column)?;
        Uuid::parse_str(&raw).map_err(|e| decode_error(column, &e.to_string()))
    }

    /// Required numeric column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or not a number.
    fn float(&self, column: &str) -> Result<f64, QueryError> {
        match self.value(column) {
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| decode_error(column, "number out of range")),
            // NUMERIC columns may arrive as strings.
            Value::String(raw) => raw
                .parse()
                .map_err(|_| decode_error(column, "expected number")),
            _ => Err(decode_error(column, "expected number")),
        }
    }

    /// Required boolean column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or not a boolean.
    fn boolean(&self, column: &str) -> Result<bool, QueryError> {
        self.value(column)
            .as_bool()
            .ok_or_else(|| decode_error(column, "expected boolean"))
    }

    /// Required timestamp column (RFC 3339).
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or unparseable.
    fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, QueryError> {
        let raw = self.text(column)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|e| decode_error(column, &e.to_string()))
    }

    /// Nullable timestamp column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when present but unparseable.
    fn opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, QueryError> {
        match self.value(column) {
            Value::Null => Ok(None),
            _ => self.timestamp(column).map(Some),
        }
    }

    /// Required date column (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when absent or unparseable.
    fn date(&self, column: &str) -> Result<NaiveDate, QueryError> {
        let raw = self.text(column)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| decode_error(column, &e.to_string()))
    }

    /// Nullable date column.
    ///
    /// # Errors
    ///
    /// [`QueryError::Decode`] when present but unparseable.
    fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>, QueryError> {
        match self.value(column) {
            Value::Null => Ok(None),
            _ => self.date(column).map(Some),
        }
    }
}

static NULL: Value = Value::Null;

impl RowExt for Row {
    fn value(&self, column: &str) -> &Value {
        self.get(column).unwrap_or(&NULL)
    }
}

fn decode_error(column: &str, reason: &str) -> QueryError {
    QueryError::Decode {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn decodes_postgres_json_shapes() {
        let id = Uuid::new_v4();
        let row = row(json!({
            "id": id.to_string(),
            "count": 12.5,
            "target": "50.00",
            "active": true,
            "created_at": "2025-01-03T10:15:00.123+00:00",
            "start_date": "2025-01-01",
            "end_date": null,
        }));

        assert_eq!(row.uuid("id").unwrap(), id);
        assert!((row.float("count").unwrap() - 12.5).abs() < f64::EPSILON);
        assert!((row.float("target").unwrap() - 50.0).abs() < f64::EPSILON);
        assert!(row.boolean("active").unwrap());
        assert_eq!(
            row.timestamp("created_at").unwrap().to_rfc3339(),
            "2025-01-03T10:15:00.123+00:00"
        );
        assert_eq!(
            row.date("start_date").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
        assert_eq!(row.opt_date("end_date").unwrap(), None);
        assert_eq!(row.opt_text("missing").unwrap(), None);
    }

    #[test]
    fn reports_column_on_decode_failure() {
        let row = row(json!({ "active": "yes" }));
        let err = row.boolean("active").unwrap_err();
        assert!(err.to_string().contains("'active'"));
    }

    #[test]
    fn optional_params_bind_null() {
        let none: Option<String> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }
}
