//! Delivery attempt entity definitions.
//!
//! Maps to the delivery_attempts table, the append-only audit trail of
//! vendor calls per notification.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::DeliveryAttempt;

/// Database entity for the delivery_attempts table.
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryAttemptEntity {
    pub id: i64,
    pub notification_id: Uuid,
    pub attempted_at: DateTime<Utc>,
    pub response_code: i32,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl From<DeliveryAttemptEntity> for DeliveryAttempt {
    fn from(e: DeliveryAttemptEntity) -> Self {
        Self {
            timestamp: e.attempted_at,
            response_code: e.response_code,
            response_body: e.response_body,
            error_message: e.error_message,
        }
    }
}
