//! Listing entities shared by the services, storage adapters, and HTTP layer.

pub mod flat;
pub mod house;
pub mod identity;
pub mod notify;

pub use flat::{
    CreateFlatRequest, Flat, FlatChange, FlatKey, FlatStatus, FlatView, StatusFilter,
    UnknownStatus, UpdateFlatRequest, ANY_STATUS,
};
pub use house::{CreateHouseRequest, House, HouseView, Subscription};
pub use identity::{Caller, Role, UserId};
pub use notify::{Notify, NotifyStatus};
