use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::error::{require_role, within, ListingError, ValidationError};
use crate::domain::{
    Caller, CreateFlatRequest, Flat, FlatChange, FlatKey, FlatStatus, FlatView, Role,
    UpdateFlatRequest, ANY_STATUS,
};
use crate::storage::FlatRepository;

/// Flat lifecycle: client creation and moderator edits.
///
/// Field validity is always enforced before storage is touched. The order of
/// status transitions is left to moderator discretion.
pub struct FlatService {
    flats: Arc<dyn FlatRepository>,
    timeout: Duration,
}

impl FlatService {
    pub fn new(flats: Arc<dyn FlatRepository>, timeout: Duration) -> Self {
        Self { flats, timeout }
    }

    /// Create a flat in the `created` state owned by the calling client.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateFlatRequest,
    ) -> Result<FlatView, ListingError> {
        info!(
            flat_id = request.flat_id,
            house_id = request.house_id,
            "creating flat"
        );

        let result: Result<FlatView, ListingError> = async {
            require_role(caller.role, Role::Client, "create flats")?;
            let flat = flat_from_request(caller, &request)?;
            within(self.timeout, async {
                let created = self.flats.create(&flat, Utc::now()).await?;
                Ok::<_, ListingError>(created.view())
            })
            .await
        }
        .await;

        if let Err(err) = &result {
            warn!(
                flat_id = request.flat_id,
                house_id = request.house_id,
                error = %err,
                "flat creation failed"
            );
        }
        result
    }

    /// Apply a moderator edit and return the full post-update projection.
    pub async fn update(
        &self,
        caller: &Caller,
        request: UpdateFlatRequest,
    ) -> Result<FlatView, ListingError> {
        info!(
            flat_id = request.id,
            house_id = request.house_id,
            status = request.status.as_deref().unwrap_or("-"),
            "updating flat"
        );

        let result: Result<FlatView, ListingError> = async {
            require_role(caller.role, Role::Moderator, "update flats")?;
            if !caller.user_id.is_well_formed() {
                return Err(ValidationError::Identity.into());
            }
            let (key, changes) = changes_from_request(&request)?;
            within(self.timeout, async {
                self.flats
                    .update_fields(key, caller.user_id, &changes)
                    .await?;
                let updated = self.flats.get(key).await?;
                Ok::<_, ListingError>(updated.view())
            })
            .await
        }
        .await;

        if let Err(err) = &result {
            warn!(
                flat_id = request.id,
                house_id = request.house_id,
                error = %err,
                "flat update failed"
            );
        }
        result
    }
}

fn flat_from_request(caller: &Caller, request: &CreateFlatRequest) -> Result<Flat, ValidationError> {
    if !caller.user_id.is_well_formed() {
        return Err(ValidationError::Identity);
    }
    if request.flat_id < 1 {
        return Err(ValidationError::FlatId(request.flat_id));
    }
    if request.house_id < 1 {
        return Err(ValidationError::HouseId(request.house_id));
    }
    if request.rooms < 1 {
        return Err(ValidationError::Rooms(request.rooms));
    }
    if request.price < 0 {
        return Err(ValidationError::Price(request.price));
    }

    Ok(Flat {
        id: request.flat_id,
        house_id: request.house_id,
        owner_id: caller.user_id,
        price: request.price,
        rooms: request.rooms,
        status: FlatStatus::Created,
        moderator_id: None,
    })
}

/// Validate an edit; only present fields are checked and turned into writes.
fn changes_from_request(
    request: &UpdateFlatRequest,
) -> Result<(FlatKey, Vec<FlatChange>), ValidationError> {
    if request.id < 1 {
        return Err(ValidationError::FlatId(request.id));
    }
    if request.house_id < 1 {
        return Err(ValidationError::HouseId(request.house_id));
    }

    let mut changes = Vec::with_capacity(3);
    if let Some(price) = request.price {
        if price < 0 {
            return Err(ValidationError::Price(price));
        }
        changes.push(FlatChange::Price(price));
    }
    if let Some(rooms) = request.rooms {
        if rooms < 1 {
            return Err(ValidationError::Rooms(rooms));
        }
        changes.push(FlatChange::Rooms(rooms));
    }
    match request.status.as_deref() {
        None | Some(ANY_STATUS) => {}
        Some(raw) => {
            let status = raw
                .parse::<FlatStatus>()
                .map_err(|_| ValidationError::Status(raw.to_string()))?;
            changes.push(FlatChange::Status(status));
        }
    }

    Ok((FlatKey::new(request.id, request.house_id), changes))
}
