//! Moderated flat listings with outbox-driven subscriber notifications.

pub mod config;
pub mod domain;
pub mod error;
pub mod listings;
pub mod notifications;
pub mod storage;
pub mod telemetry;
