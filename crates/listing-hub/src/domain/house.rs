use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct House {
    pub id: i64,
    pub address: String,
    pub construct_year: i32,
    pub developer: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed every time a flat is added to the house.
    pub updated_at: DateTime<Utc>,
}

impl House {
    pub fn view(&self) -> HouseView {
        HouseView {
            id: self.id,
            address: self.address.clone(),
            year: self.construct_year,
            developer: self.developer.clone(),
            created_at: self.created_at,
            update_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHouseRequest {
    pub id: i64,
    pub address: String,
    pub year: i32,
    #[serde(default)]
    pub developer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseView {
    pub id: i64,
    pub address: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub update_at: DateTime<Utc>,
}

/// A client's request to be told about newly approved flats in a house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub house_id: i64,
    pub user_id: UserId,
    pub email: String,
}
