//! Persistence seams: repository traits, the retrying statement executor, and the
//! Postgres and in-memory adapters behind them.

pub mod executor;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod sql;

pub use executor::{Database, Row, SqlValue, Statement};
pub use memory::InMemoryStore;
pub use postgres::PgDatabase;
pub use repository::{FlatRepository, HouseRepository, NotifyRepository, RepositoryError};
pub use retry::{RetryAdapter, RetryPolicy};
pub use sql::{SqlFlatRepository, SqlHouseRepository, SqlNotifyRepository};
