//! Notification domain model and API payloads.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::delivery::DeliveryAttempt;

/// HTTP methods accepted for outbound deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a notification.
///
/// DELIVERED, FAILED and CANCELLED are terminal; the only transition out of
/// a terminal state is FAILED -> PENDING via an explicit operator reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    Failed,
    Cancelled,
}

impl NotificationStatus {
    /// Storage representation (lowercase text column).
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::Pending)
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "delivered" => Ok(NotificationStatus::Delivered),
            "failed" => Ok(NotificationStatus::Failed),
            "cancelled" => Ok(NotificationStatus::Cancelled),
            other => Err(format!("unknown notification status: {}", other)),
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification and its delivery state, as read from the store.
///
/// The store is the system of record: state transitions happen through
/// guarded repository updates, never by mutating this value in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub vendor_name: String,
    pub target_url: String,
    pub http_method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub idempotency_key: Option<String>,
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempts: Vec<DeliveryAttempt>,
}

/// Fields for a notification that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub vendor_name: String,
    pub target_url: String,
    pub http_method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Request payload for submitting a notification.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, message = "vendorName is required"))]
    pub vendor_name: String,

    #[validate(custom(function = validate_http_url))]
    pub target_url: String,

    #[validate(custom(function = validate_http_method))]
    pub http_method: String,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    pub body: Option<String>,

    pub idempotency_key: Option<String>,
}

impl CreateNotificationRequest {
    /// Converts a validated request into insertable fields.
    ///
    /// Callers must run `validate()` first; the method parse is infallible
    /// afterwards, and an empty idempotency key is treated as absent.
    pub fn into_new(self) -> Result<NewNotification, String> {
        let http_method = HttpMethod::from_str(&self.http_method)?;
        let idempotency_key = self.idempotency_key.filter(|k| !k.is_empty());
        Ok(NewNotification {
            vendor_name: self.vendor_name,
            target_url: self.target_url,
            http_method,
            headers: self.headers.unwrap_or_default(),
            body: self.body,
            idempotency_key,
        })
    }
}

/// Custom validator for HTTP(S) URLs.
fn validate_http_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("http_url");
        err.message = Some("targetUrl must be a valid HTTP(S) URL".into());
        Err(err)
    }
}

/// Custom validator for the HTTP method field.
fn validate_http_method(method: &str) -> Result<(), validator::ValidationError> {
    if HttpMethod::from_str(method).is_ok() {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("http_method");
        err.message = Some("httpMethod must be GET, POST, PUT, PATCH, or DELETE".into());
        Err(err)
    }
}

/// Acknowledgement payload returned on create and retry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationResponse {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            status: n.status,
            created_at: n.created_at,
        }
    }
}

/// Full record payload including the attempt history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatusResponse {
    pub id: Uuid,
    pub vendor_name: String,
    pub target_url: String,
    pub http_method: HttpMethod,
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub attempts: Vec<DeliveryAttempt>,
}

impl From<Notification> for NotificationStatusResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            vendor_name: n.vendor_name,
            target_url: n.target_url,
            http_method: n.http_method,
            status: n.status,
            retry_count: n.retry_count,
            created_at: n.created_at,
            updated_at: n.updated_at,
            next_retry_at: n.next_retry_at,
            attempts: n.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateNotificationRequest {
        CreateNotificationRequest {
            vendor_name: "generic".to_string(),
            target_url: "https://example.test/hook".to_string(),
            http_method: "POST".to_string(),
            headers: None,
            body: Some("{}".to_string()),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_http_method_round_trip() {
        for (text, method) in [
            ("GET", HttpMethod::Get),
            ("POST", HttpMethod::Post),
            ("PUT", HttpMethod::Put),
            ("PATCH", HttpMethod::Patch),
            ("DELETE", HttpMethod::Delete),
        ] {
            assert_eq!(HttpMethod::from_str(text).unwrap(), method);
            assert_eq!(method.as_str(), text);
        }
    }

    #[test]
    fn test_http_method_rejects_unknown() {
        assert!(HttpMethod::from_str("HEAD").is_err());
        assert!(HttpMethod::from_str("post").is_err());
        assert!(HttpMethod::from_str("").is_err());
    }

    #[test]
    fn test_status_storage_round_trip() {
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Delivered,
            NotificationStatus::Failed,
            NotificationStatus::Cancelled,
        ] {
            assert_eq!(NotificationStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_terminal() {
        assert!(!NotificationStatus::Pending.is_terminal());
        assert!(NotificationStatus::Delivered.is_terminal());
        assert!(NotificationStatus::Failed.is_terminal());
        assert!(NotificationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_wire_format_is_screaming_case() {
        let json = serde_json::to_string(&NotificationStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }

    #[test]
    fn test_create_request_valid() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_empty_vendor() {
        let mut request = valid_request();
        request.vendor_name = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_non_http_url() {
        let mut request = valid_request();
        request.target_url = "ftp://example.test/hook".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_unknown_method() {
        let mut request = valid_request();
        request.http_method = "TRACE".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_request_accepts_plain_http() {
        let mut request = valid_request();
        request.target_url = "http://internal.test/hook".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_deserializes_camel_case() {
        let json = r#"{
            "vendorName": "payments",
            "targetUrl": "https://example.test/hook",
            "httpMethod": "PUT",
            "headers": {"X-Token": "abc"},
            "idempotencyKey": "k1"
        }"#;

        let request: CreateNotificationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.vendor_name, "payments");
        assert_eq!(request.http_method, "PUT");
        assert_eq!(
            request.headers.as_ref().unwrap().get("X-Token"),
            Some(&"abc".to_string())
        );
        assert_eq!(request.idempotency_key, Some("k1".to_string()));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_into_new_blank_idempotency_key_treated_as_absent() {
        let mut request = valid_request();
        request.idempotency_key = Some(String::new());
        let new = request.into_new().unwrap();
        assert!(new.idempotency_key.is_none());
        assert_eq!(new.http_method, HttpMethod::Post);
        assert!(new.headers.is_empty());
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = NotificationResponse {
            id: Uuid::new_v4(),
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"createdAt\":"));
        assert!(json.contains("\"status\":\"PENDING\""));
    }
}
