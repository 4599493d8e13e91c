//! Flat lifecycle and house listing services.

pub mod error;
pub mod flats;
pub mod houses;
pub mod projection;

pub use error::{ListingError, ValidationError};
pub use flats::FlatService;
pub use houses::{FlatsByHouse, HouseService};
pub use projection::project_flats;
