use crate::auth::TokenAuthority;
use crate::cli::ServeArgs;
use crate::infra::{AppState, Repositories};
use crate::routes::{with_listing_routes, ListingServices};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_hub::config::AppConfig;
use listing_hub::error::AppError;
use listing_hub::listings::{FlatService, HouseService};
use listing_hub::notifications::{LogMailSender, NotificationDispatcher};
use listing_hub::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repositories = Repositories::connect(&config.database).await?;
    let timeout = config.database.operation_timeout;
    let services = ListingServices {
        flats: Arc::new(FlatService::new(repositories.flats.clone(), timeout)),
        houses: Arc::new(HouseService::new(
            repositories.flats.clone(),
            repositories.houses.clone(),
            timeout,
            config.listing.parallel_threshold,
        )),
    };

    let dispatcher = NotificationDispatcher::new(repositories.outbox, Arc::new(LogMailSender))
        .start(config.notifier.poll_interval, config.notifier.poll_timeout);

    let authority = TokenAuthority::new(&config.auth.secret, config.auth.token_ttl);
    let app = with_listing_routes(services)
        .layer(Extension(authority))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "listing hub ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    if let Err(err) = dispatcher.stop().await {
        warn!(error = %err, "notification dispatcher ended abnormally");
    }
    info!("listing hub stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c, shutting down");
    }
}
