//! Repository implementations for database operations.

pub mod notification;
pub mod work_queue;

pub use notification::NotificationRepository;
pub use work_queue::WorkQueueRepository;
