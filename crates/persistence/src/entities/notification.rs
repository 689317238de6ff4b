//! Notification entity definitions.
//!
//! Maps to the notifications table. Attempt history lives in the
//! delivery_attempts child table and is joined in by the repository.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{HttpMethod, Notification, NotificationStatus};

use crate::entities::DeliveryAttemptEntity;

/// Database entity for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: i64,
    pub notification_id: Uuid,
    pub vendor_name: String,
    pub target_url: String,
    pub http_method: String,
    pub headers: serde_json::Value,
    pub body: Option<String>,
    pub idempotency_key: Option<String>,
    pub status: String,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationEntity {
    /// Combines a row with its attempt history into a domain model.
    ///
    /// Rows with an unknown status or method text are surfaced as decode
    /// errors rather than silently coerced.
    pub fn into_domain(
        self,
        attempts: Vec<DeliveryAttemptEntity>,
    ) -> Result<Notification, sqlx::Error> {
        let status = NotificationStatus::from_str(&self.status).map_err(decode_error)?;
        let http_method = HttpMethod::from_str(&self.http_method).map_err(decode_error)?;
        let headers: HashMap<String, String> =
            serde_json::from_value(self.headers).map_err(|e| decode_error(e.to_string()))?;

        Ok(Notification {
            id: self.notification_id,
            vendor_name: self.vendor_name,
            target_url: self.target_url,
            http_method,
            headers,
            body: self.body,
            idempotency_key: self.idempotency_key,
            status,
            retry_count: self.retry_count,
            next_retry_at: self.next_retry_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            attempts: attempts.into_iter().map(Into::into).collect(),
        })
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::DeliveryAttempt;

    fn entity(status: &str, method: &str) -> NotificationEntity {
        NotificationEntity {
            id: 1,
            notification_id: Uuid::new_v4(),
            vendor_name: "generic".to_string(),
            target_url: "https://example.test/hook".to_string(),
            http_method: method.to_string(),
            headers: serde_json::json!({"X-Token": "abc"}),
            body: Some("{}".to_string()),
            idempotency_key: None,
            status: status.to_string(),
            retry_count: 2,
            next_retry_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_into_domain() {
        let id = Uuid::new_v4();
        let attempts = vec![DeliveryAttemptEntity {
            id: 1,
            notification_id: id,
            attempted_at: Utc::now(),
            response_code: 503,
            response_body: None,
            error_message: Some("unavailable".to_string()),
        }];

        let notification = entity("pending", "POST").into_domain(attempts).unwrap();
        assert_eq!(notification.status, NotificationStatus::Pending);
        assert_eq!(notification.http_method, HttpMethod::Post);
        assert_eq!(notification.headers.get("X-Token").unwrap(), "abc");
        assert_eq!(notification.attempts.len(), 1);
        assert_eq!(notification.attempts[0].response_code, 503);
    }

    #[test]
    fn test_into_domain_rejects_unknown_status() {
        assert!(entity("archived", "POST").into_domain(Vec::new()).is_err());
    }

    #[test]
    fn test_into_domain_rejects_unknown_method() {
        assert!(entity("pending", "HEAD").into_domain(Vec::new()).is_err());
    }

    #[test]
    fn test_attempt_entity_conversion() {
        let entity = DeliveryAttemptEntity {
            id: 7,
            notification_id: Uuid::new_v4(),
            attempted_at: Utc::now(),
            response_code: 200,
            response_body: Some("ok".to_string()),
            error_message: None,
        };

        let attempt: DeliveryAttempt = entity.into();
        assert_eq!(attempt.response_code, 200);
        assert_eq!(attempt.response_body.as_deref(), Some("ok"));
        assert!(attempt.error_message.is_none());
    }
}
