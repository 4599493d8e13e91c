use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identity::UserId;

/// Wildcard accepted wherever a status filter is expected.
pub const ANY_STATUS: &str = "any";

/// Moderation state of a flat listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatStatus {
    #[default]
    Created,
    #[serde(alias = "on moderation")]
    OnModeration,
    Approved,
    Declined,
}

impl FlatStatus {
    pub const ALL: [FlatStatus; 4] = [
        FlatStatus::Created,
        FlatStatus::OnModeration,
        FlatStatus::Approved,
        FlatStatus::Declined,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FlatStatus::Created => "created",
            FlatStatus::OnModeration => "on_moderation",
            FlatStatus::Approved => "approved",
            FlatStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for FlatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flat status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for FlatStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(FlatStatus::Created),
            "on_moderation" | "on moderation" => Ok(FlatStatus::OnModeration),
            "approved" => Ok(FlatStatus::Approved),
            "declined" => Ok(FlatStatus::Declined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status selector for listing queries; `Any` matches every status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    Only(FlatStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: FlatStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Only(expected) => *expected == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == ANY_STATUS {
            return Ok(StatusFilter::Any);
        }
        value.parse().map(StatusFilter::Only)
    }
}

/// Composite identity of a flat: flat numbers are unique per house only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlatKey {
    pub flat_id: i64,
    pub house_id: i64,
}

impl FlatKey {
    pub fn new(flat_id: i64, house_id: i64) -> Self {
        Self { flat_id, house_id }
    }
}

/// Stored flat, including ownership and moderation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flat {
    pub id: i64,
    pub house_id: i64,
    pub owner_id: UserId,
    pub price: i64,
    pub rooms: i32,
    pub status: FlatStatus,
    pub moderator_id: Option<UserId>,
}

impl Flat {
    pub fn key(&self) -> FlatKey {
        FlatKey::new(self.id, self.house_id)
    }

    pub fn view(&self) -> FlatView {
        FlatView::from(self)
    }
}

/// Public projection of a flat; the moderator identity is never exposed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatView {
    pub id: i64,
    pub house_id: i64,
    pub price: i64,
    pub rooms: i32,
    pub status: FlatStatus,
}

impl From<&Flat> for FlatView {
    fn from(flat: &Flat) -> Self {
        Self {
            id: flat.id,
            house_id: flat.house_id,
            price: flat.price,
            rooms: flat.rooms,
            status: flat.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFlatRequest {
    pub flat_id: i64,
    pub house_id: i64,
    pub price: i64,
    pub rooms: i32,
}

/// Moderator edit; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFlatRequest {
    pub id: i64,
    pub house_id: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub rooms: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A single validated field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatChange {
    Price(i64),
    Rooms(i32),
    Status(FlatStatus),
}

impl FlatChange {
    pub fn column(&self) -> &'static str {
        match self {
            FlatChange::Price(_) => "price",
            FlatChange::Rooms(_) => "rooms",
            FlatChange::Status(_) => "status",
        }
    }

    pub fn apply(&self, flat: &mut Flat) {
        match *self {
            FlatChange::Price(price) => flat.price = price,
            FlatChange::Rooms(rooms) => flat.rooms = rooms,
            FlatChange::Status(status) => flat.status = status,
        }
    }
}
