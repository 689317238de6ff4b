//! Domain layer for the webhook dispatch service.
//!
//! This crate contains:
//! - Domain models (Notification, DeliveryAttempt, DeliveryResult)
//! - Business logic services (retry delay calculation)
//! - Request/response payloads for the notification API

pub mod models;
pub mod services;
