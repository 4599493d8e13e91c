use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use listing_hub::config::DatabaseConfig;
use listing_hub::error::AppError;
use listing_hub::storage::{
    FlatRepository, HouseRepository, InMemoryStore, NotifyRepository, PgDatabase, RetryAdapter,
    SqlFlatRepository, SqlHouseRepository, SqlNotifyRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

const POOL_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Repository handles shared by the services and the dispatcher.
#[derive(Clone)]
pub(crate) struct Repositories {
    pub(crate) flats: Arc<dyn FlatRepository>,
    pub(crate) houses: Arc<dyn HouseRepository>,
    pub(crate) outbox: Arc<dyn NotifyRepository>,
}

impl Repositories {
    pub(crate) fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            flats: store.clone(),
            houses: store.clone(),
            outbox: store,
        }
    }

    /// Postgres behind the retry adapter when `DATABASE_URL` is set, otherwise in-memory.
    pub(crate) async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let Some(url) = config.url.as_deref() else {
            warn!("DATABASE_URL not set, using the in-memory store");
            return Ok(Self::in_memory());
        };

        let pg = PgDatabase::connect(url, POOL_MAX_CONNECTIONS).await?;
        let policy = config.retry_policy();
        info!(
            attempts = policy.max_attempts(),
            sleep_ms = policy.sleep.as_millis() as u64,
            "connected to postgres"
        );
        let db = Arc::new(RetryAdapter::new(pg, policy));

        Ok(Self {
            flats: Arc::new(SqlFlatRepository::new(db.clone())),
            houses: Arc::new(SqlHouseRepository::new(db.clone())),
            outbox: Arc::new(SqlNotifyRepository::new(db)),
        })
    }
}
