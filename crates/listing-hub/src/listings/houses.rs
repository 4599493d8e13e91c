use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use super::error::{require_role, within, ListingError, ValidationError};
use super::projection::project_flats;
use crate::domain::{
    Caller, CreateHouseRequest, FlatView, House, HouseView, Role, StatusFilter, Subscription,
};
use crate::storage::{FlatRepository, HouseRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatsByHouse {
    pub flats: Vec<FlatView>,
}

/// House registration, subscriptions, and the per-house flat listing.
pub struct HouseService {
    flats: Arc<dyn FlatRepository>,
    houses: Arc<dyn HouseRepository>,
    timeout: Duration,
    flat_threshold: usize,
}

impl HouseService {
    pub fn new(
        flats: Arc<dyn FlatRepository>,
        houses: Arc<dyn HouseRepository>,
        timeout: Duration,
        flat_threshold: usize,
    ) -> Self {
        Self {
            flats,
            houses,
            timeout,
            flat_threshold,
        }
    }

    /// List a house's flats, optionally filtered by status (`"any"` matches all).
    pub async fn flats_by_house(
        &self,
        house_id: i64,
        status: &str,
    ) -> Result<FlatsByHouse, ListingError> {
        info!(house_id, status, "listing flats by house");

        let result: Result<FlatsByHouse, ListingError> = async {
            if house_id < 0 {
                return Err(ValidationError::NegativeHouseId(house_id).into());
            }
            let filter: StatusFilter = status
                .parse()
                .map_err(|_| ValidationError::Status(status.to_string()))?;

            let stored = within(self.timeout, async {
                Ok::<_, ListingError>(self.flats.list_by_house(house_id, filter).await?)
            })
            .await?;

            let threshold = self.flat_threshold;
            let flats = spawn_blocking(move || project_flats(&stored, threshold))
                .await
                .map_err(|err| ListingError::Task(err.to_string()))?;
            Ok(FlatsByHouse { flats })
        }
        .await;

        if let Err(err) = &result {
            warn!(house_id, status, error = %err, "flat listing failed");
        }
        result
    }

    pub async fn create_house(
        &self,
        caller: &Caller,
        request: CreateHouseRequest,
    ) -> Result<HouseView, ListingError> {
        info!(house_id = request.id, "creating house");

        let result: Result<HouseView, ListingError> = async {
            require_role(caller.role, Role::Moderator, "create houses")?;
            let house = house_from_request(request)?;
            within(self.timeout, async {
                let created = self.houses.create(&house).await?;
                Ok::<_, ListingError>(created.view())
            })
            .await
        }
        .await;

        if let Err(err) = &result {
            warn!(error = %err, "house creation failed");
        }
        result
    }

    /// Register the caller's e-mail for notifications about newly approved flats.
    pub async fn subscribe(
        &self,
        caller: &Caller,
        house_id: i64,
        email: String,
    ) -> Result<(), ListingError> {
        info!(house_id, "subscribing to house");

        let result: Result<(), ListingError> = async {
            require_role(caller.role, Role::Client, "subscribe to houses")?;
            if !caller.user_id.is_well_formed() {
                return Err(ValidationError::Identity.into());
            }
            if house_id < 1 {
                return Err(ValidationError::HouseId(house_id).into());
            }
            let email = email.trim().to_string();
            if !is_plausible_email(&email) {
                return Err(ValidationError::Email(email).into());
            }

            let subscription = Subscription {
                house_id,
                user_id: caller.user_id,
                email,
            };
            within(self.timeout, async {
                self.houses.subscribe(&subscription).await?;
                Ok::<_, ListingError>(())
            })
            .await
        }
        .await;

        if let Err(err) = &result {
            warn!(house_id, error = %err, "subscription failed");
        }
        result
    }
}

fn house_from_request(request: CreateHouseRequest) -> Result<House, ValidationError> {
    if request.id < 1 {
        return Err(ValidationError::HouseId(request.id));
    }
    if request.address.trim().is_empty() {
        return Err(ValidationError::Address);
    }
    if request.year < 0 {
        return Err(ValidationError::Year(request.year));
    }

    let now = Utc::now();
    Ok(House {
        id: request.id,
        address: request.address.trim().to_string(),
        construct_year: request.year,
        developer: request
            .developer
            .map(|developer| developer.trim().to_string())
            .filter(|developer| !developer.is_empty()),
        created_at: now,
        updated_at: now,
    })
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}
