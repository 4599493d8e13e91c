use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Flat, FlatChange, FlatKey, House, Notify, StatusFilter, Subscription, UserId,
};

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected row shape: {0}")]
    Decode(String),
}

/// Flat persistence used by the lifecycle service and the listing query.
#[async_trait]
pub trait FlatRepository: Send + Sync {
    /// Insert a new flat and refresh the owning house's `updated_at` in one unit.
    async fn create(&self, flat: &Flat, touched_at: DateTime<Utc>) -> Result<Flat, RepositoryError>;

    /// Apply every change, one statement per field, all-or-nothing.
    async fn update_fields(
        &self,
        key: FlatKey,
        moderator: UserId,
        changes: &[FlatChange],
    ) -> Result<(), RepositoryError>;

    async fn get(&self, key: FlatKey) -> Result<Flat, RepositoryError>;

    async fn list_by_house(
        &self,
        house_id: i64,
        filter: StatusFilter,
    ) -> Result<Vec<Flat>, RepositoryError>;
}

#[async_trait]
pub trait HouseRepository: Send + Sync {
    async fn create(&self, house: &House) -> Result<House, RepositoryError>;

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), RepositoryError>;
}

/// Outbox access for the notification dispatcher.
#[async_trait]
pub trait NotifyRepository: Send + Sync {
    async fn unsent(&self) -> Result<Vec<Notify>, RepositoryError>;

    async fn mark_sent(&self, notify_id: i64) -> Result<(), RepositoryError>;
}
