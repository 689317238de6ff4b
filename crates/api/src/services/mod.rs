//! Business services for the notification API.

pub mod notification;

pub use notification::NotificationService;
