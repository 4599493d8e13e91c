use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::RepositoryError;

/// Positional argument or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// SQL text plus positional (`$1`, `$2`, ...) arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: &'static str,
    pub args: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: &'static str) -> Self {
        Self {
            sql,
            args: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// A result row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<SqlValue>) {
        self.columns.insert(column.to_string(), value.into());
    }

    fn value(&self, column: &str) -> Result<&SqlValue, RepositoryError> {
        self.columns
            .get(column)
            .ok_or_else(|| RepositoryError::Decode(format!("missing column '{column}'")))
    }

    fn mismatch(column: &str, expected: &str, found: &SqlValue) -> RepositoryError {
        RepositoryError::Decode(format!(
            "column '{column}' expected {expected}, found {found:?}"
        ))
    }

    pub fn int(&self, column: &str) -> Result<i64, RepositoryError> {
        match self.value(column)? {
            SqlValue::Int(value) => Ok(*value),
            other => Err(Self::mismatch(column, "integer", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, RepositoryError> {
        match self.value(column)? {
            SqlValue::Text(value) => Ok(value.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, RepositoryError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(value) => Ok(Some(value.clone())),
            other => Err(Self::mismatch(column, "text or null", other)),
        }
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, RepositoryError> {
        match self.value(column)? {
            SqlValue::Uuid(value) => Ok(*value),
            other => Err(Self::mismatch(column, "uuid", other)),
        }
    }

    pub fn opt_uuid(&self, column: &str) -> Result<Option<Uuid>, RepositoryError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Uuid(value) => Ok(Some(*value)),
            other => Err(Self::mismatch(column, "uuid or null", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
        match self.value(column)? {
            SqlValue::Timestamp(value) => Ok(*value),
            other => Err(Self::mismatch(column, "timestamp", other)),
        }
    }
}

/// Statement-level access to a relational store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a command, returning the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64, RepositoryError>;

    /// Fetch exactly one row; no rows is `RepositoryError::NotFound`.
    async fn fetch_one(&self, statement: &Statement) -> Result<Row, RepositoryError>;

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, RepositoryError>;

    /// Run every statement inside one transaction, returning affected rows per statement.
    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, RepositoryError>;
}

#[async_trait]
impl<D: Database + ?Sized> Database for Arc<D> {
    async fn execute(&self, statement: &Statement) -> Result<u64, RepositoryError> {
        (**self).execute(statement).await
    }

    async fn fetch_one(&self, statement: &Statement) -> Result<Row, RepositoryError> {
        (**self).fetch_one(statement).await
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, RepositoryError> {
        (**self).fetch_all(statement).await
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, RepositoryError> {
        (**self).execute_atomic(statements).await
    }
}
