//! Postgres-backed [`Database`] built on a shared sqlx connection pool.
//!
//! Database errors are mapped onto [`RepositoryError`]:
//!
//! | sqlx error | Postgres code | RepositoryError |
//! |------------|---------------|-----------------|
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (unique violation) | `23505` | `Conflict` |
//! | RowNotFound | n/a | `NotFound` |
//! | ColumnDecode / Decode | n/a | `Decode` |
//! | anything else | any | `Unavailable` |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use uuid::Uuid;

use super::executor::{Database, Row, SqlValue, Statement};
use super::repository::RepositoryError;

#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn execute(&self, statement: &Statement) -> Result<u64, RepositoryError> {
        let result = bind(statement)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch_one(&self, statement: &Statement) -> Result<Row, RepositoryError> {
        let row = bind(statement)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| RepositoryError::NotFound("query returned no rows".to_string()))?;
        decode_row(&row)
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, RepositoryError> {
        let rows = bind(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, RepositoryError> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            let result = bind(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            affected.push(result.rows_affected());
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(affected)
    }
}

fn bind(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(statement.sql);
    for arg in &statement.args {
        query = match arg {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Int(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.as_str()),
            SqlValue::Uuid(value) => query.bind(*value),
            SqlValue::Timestamp(value) => query.bind(*value),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Row, RepositoryError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .map(|value| SqlValue::from(value.map(i64::from))),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .map(|value| SqlValue::from(value.map(i64::from))),
            "INT8" => row.try_get::<Option<i64>, _>(index).map(SqlValue::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(index).map(SqlValue::from)
            }
            "UUID" => row.try_get::<Option<Uuid>, _>(index).map(SqlValue::from),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)
                .map(SqlValue::from),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(index)
                .map(|value| SqlValue::from(value.map(|naive| naive.and_utc()))),
            other => {
                return Err(RepositoryError::Decode(format!(
                    "unsupported column type {other} for '{}'",
                    column.name()
                )))
            }
        }
        .map_err(map_sqlx_error)?;
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound("query returned no rows".to_string()),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23503") => RepositoryError::NotFound(db.message().to_string()),
            Some("23505") => RepositoryError::Conflict(db.message().to_string()),
            _ => RepositoryError::Unavailable(err.to_string()),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RepositoryError::Decode(err.to_string())
        }
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}
