//! Domain models for the webhook dispatch service.

pub mod delivery;
pub mod notification;

pub use delivery::{DeliveryAttempt, DeliveryResult};
pub use notification::{
    CreateNotificationRequest, HttpMethod, NewNotification, Notification, NotificationResponse,
    NotificationStatus, NotificationStatusResponse,
};
