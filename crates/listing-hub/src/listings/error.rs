use std::time::Duration;

use crate::domain::Role;
use crate::storage::RepositoryError;

/// Malformed or out-of-range input, detected before any storage call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("flat id must be at least 1, got {0}")]
    FlatId(i64),
    #[error("house id must be at least 1, got {0}")]
    HouseId(i64),
    #[error("house id must not be negative, got {0}")]
    NegativeHouseId(i64),
    #[error("rooms must be at least 1, got {0}")]
    Rooms(i32),
    #[error("price must not be negative, got {0}")]
    Price(i64),
    #[error("unknown flat status '{0}'")]
    Status(String),
    #[error("caller identity is not a valid user id")]
    Identity,
    #[error("address must not be empty")]
    Address,
    #[error("construction year must not be negative, got {0}")]
    Year(i32),
    #[error("'{0}' is not a valid e-mail address")]
    Email(String),
}

/// Error raised by the listing services.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),
    #[error("{role} role is not allowed to {action}")]
    Forbidden { role: Role, action: &'static str },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(RepositoryError),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<RepositoryError> for ListingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(what) => ListingError::NotFound(what),
            other => ListingError::Storage(other),
        }
    }
}

/// Bound a service call by `limit`, dropping pending storage retries on expiry.
pub(crate) async fn within<T, F>(limit: Duration, call: F) -> Result<T, ListingError>
where
    F: std::future::Future<Output = Result<T, ListingError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ListingError::Timeout(limit)),
    }
}

pub(crate) fn require_role(
    role: Role,
    required: Role,
    action: &'static str,
) -> Result<(), ListingError> {
    if role == required {
        Ok(())
    } else {
        Err(ListingError::Forbidden { role, action })
    }
}
