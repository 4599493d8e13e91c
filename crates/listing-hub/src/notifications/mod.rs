//! Outbox delivery: a background dispatcher draining unsent rows through a sender.

pub mod dispatcher;
pub mod sender;

pub use dispatcher::{DispatcherHandle, NotificationDispatcher, PollReport};
pub use sender::{DeliveryError, LogMailSender, NotificationSender};
