//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod delivery_attempt;
pub mod notification;
pub mod work_item;

pub use delivery_attempt::DeliveryAttemptEntity;
pub use notification::NotificationEntity;
pub use work_item::WorkItemEntity;
