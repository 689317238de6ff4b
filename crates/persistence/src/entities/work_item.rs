//! Work queue entity definitions.
//!
//! Maps to the work_queue table. Rows are transient: inserted on publish,
//! leased while a worker processes them, and deleted on ack.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for the work_queue table.
///
/// `retry_count` is advisory; the notifications table is authoritative for
/// retry decisions.
#[derive(Debug, Clone, FromRow)]
pub struct WorkItemEntity {
    pub id: i64,
    pub notification_id: Uuid,
    pub retry_count: i32,
    pub available_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
