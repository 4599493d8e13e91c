use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use listing_hub::domain::{
    Caller, CreateFlatRequest, CreateHouseRequest, FlatView, HouseView, Role, UpdateFlatRequest,
    UserId, ANY_STATUS,
};
use listing_hub::listings::{FlatService, FlatsByHouse, HouseService, ListingError};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AuthError, Authenticated, TokenAuthority};
use crate::infra::AppState;

/// Services shared by the listing handlers.
#[derive(Clone)]
pub(crate) struct ListingServices {
    pub(crate) flats: Arc<FlatService>,
    pub(crate) houses: Arc<HouseService>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DummyLoginQuery {
    pub(crate) user_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlatsQuery {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    pub(crate) email: String,
}

/// HTTP rendering of service failures.
pub(crate) struct ApiError(ListingError);

impl From<ListingError> for ApiError {
    fn from(value: ListingError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ListingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ListingError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ListingError::NotFound(_) => StatusCode::NOT_FOUND,
            ListingError::Storage(_) | ListingError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ListingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub(crate) fn with_listing_routes(services: ListingServices) -> Router {
    Router::new()
        .route("/house/create", post(create_house))
        .route("/house/:id", get(flats_by_house))
        .route("/house/:id/subscribe", post(subscribe))
        .route("/flat/create", post(create_flat))
        .route("/flat/update", post(update_flat))
        .with_state(services)
        .route("/dummyLogin", get(dummy_login))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Mint a token for a fresh identity with the requested role.
pub(crate) async fn dummy_login(
    Extension(authority): Extension<TokenAuthority>,
    Query(query): Query<DummyLoginQuery>,
) -> Result<Json<TokenResponse>, Response> {
    let role: Role = query.user_type.parse().map_err(|err: String| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response()
    })?;
    let caller = Caller::new(UserId::new_random(), role);
    let token = authority
        .issue(&caller)
        .map_err(AuthError::into_response)?;
    Ok(Json(TokenResponse { token }))
}

pub(crate) async fn create_house(
    State(services): State<ListingServices>,
    Authenticated(caller): Authenticated,
    Json(request): Json<CreateHouseRequest>,
) -> Result<Json<HouseView>, ApiError> {
    Ok(Json(services.houses.create_house(&caller, request).await?))
}

pub(crate) async fn flats_by_house(
    State(services): State<ListingServices>,
    Authenticated(_caller): Authenticated,
    Path(house_id): Path<i64>,
    Query(query): Query<FlatsQuery>,
) -> Result<Json<FlatsByHouse>, ApiError> {
    let status = query.status.as_deref().unwrap_or(ANY_STATUS);
    Ok(Json(services.houses.flats_by_house(house_id, status).await?))
}

pub(crate) async fn subscribe(
    State(services): State<ListingServices>,
    Authenticated(caller): Authenticated,
    Path(house_id): Path<i64>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services
        .houses
        .subscribe(&caller, house_id, request.email)
        .await?;
    Ok(Json(json!({ "status": "subscribed" })))
}

pub(crate) async fn create_flat(
    State(services): State<ListingServices>,
    Authenticated(caller): Authenticated,
    Json(request): Json<CreateFlatRequest>,
) -> Result<Json<FlatView>, ApiError> {
    Ok(Json(services.flats.create(&caller, request).await?))
}

pub(crate) async fn update_flat(
    State(services): State<ListingServices>,
    Authenticated(caller): Authenticated,
    Json(request): Json<UpdateFlatRequest>,
) -> Result<Json<FlatView>, ApiError> {
    Ok(Json(services.flats.update(&caller, request).await?))
}
