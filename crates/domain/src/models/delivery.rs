//! Delivery attempt records and transient delivery results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded invocation of a vendor adapter.
///
/// Appended to the notification's attempt history and never modified.
/// A `response_code` of 0 marks a transport-level failure (timeout, refused
/// connection, DNS, TLS) where no HTTP response was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttempt {
    pub timestamp: DateTime<Utc>,
    pub response_code: i32,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl DeliveryAttempt {
    /// Records a successful delivery.
    pub fn success(response_code: i32, response_body: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            response_code,
            response_body,
            error_message: None,
        }
    }

    /// Records a failed delivery that received an HTTP response.
    pub fn failure(
        response_code: i32,
        response_body: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            response_code,
            response_body,
            error_message,
        }
    }

    /// Records an attempt that never reached the vendor.
    pub fn connection_failure(error_message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            response_code: 0,
            response_body: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Outcome of a single adapter call. Not persisted; the worker converts it
/// into a [`DeliveryAttempt`] after classification.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: u16,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl DeliveryResult {
    pub fn success(status_code: u16, response_body: Option<String>) -> Self {
        Self {
            success: true,
            status_code,
            response_body,
            error_message: None,
        }
    }

    pub fn failure(
        status_code: u16,
        response_body: Option<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            status_code,
            response_body,
            error_message: Some(error_message.into()),
        }
    }

    pub fn connection_failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: 0,
            response_body: None,
            error_message: Some(error_message.into()),
        }
    }

    /// Default retryability classification: transport failures, 429, and
    /// 5xx may succeed on a later attempt; other statuses will not.
    pub fn is_retryable(&self) -> bool {
        self.status_code == 0 || self.status_code == 429 || self.status_code >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = DeliveryResult::success(200, Some("ok".to_string()));
        assert!(result.success);
        assert_eq!(result.status_code, 200);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failure_result_keeps_details() {
        let result = DeliveryResult::failure(503, Some("busy".to_string()), "server error");
        assert!(!result.success);
        assert_eq!(result.status_code, 503);
        assert_eq!(result.response_body.as_deref(), Some("busy"));
        assert_eq!(result.error_message.as_deref(), Some("server error"));
    }

    #[test]
    fn test_connection_failure_has_status_zero() {
        let result = DeliveryResult::connection_failure("connection refused");
        assert!(!result.success);
        assert_eq!(result.status_code, 0);
        assert!(result.response_body.is_none());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DeliveryResult::connection_failure("timeout").is_retryable());
        assert!(DeliveryResult::failure(429, None, "rate limited").is_retryable());
        assert!(DeliveryResult::failure(500, None, "server error").is_retryable());
        assert!(DeliveryResult::failure(503, None, "unavailable").is_retryable());
        assert!(!DeliveryResult::failure(400, None, "bad request").is_retryable());
        assert!(!DeliveryResult::failure(404, None, "not found").is_retryable());
        assert!(!DeliveryResult::failure(410, None, "gone").is_retryable());
    }

    #[test]
    fn test_attempt_constructors() {
        let ok = DeliveryAttempt::success(200, None);
        assert_eq!(ok.response_code, 200);
        assert!(ok.error_message.is_none());

        let failed = DeliveryAttempt::failure(400, Some("bad".into()), Some("rejected".into()));
        assert_eq!(failed.response_code, 400);
        assert_eq!(failed.error_message.as_deref(), Some("rejected"));

        let transport = DeliveryAttempt::connection_failure("dns failure");
        assert_eq!(transport.response_code, 0);
        assert!(transport.response_body.is_none());
        assert_eq!(transport.error_message.as_deref(), Some("dns failure"));
    }

    #[test]
    fn test_attempt_serializes_camel_case() {
        let attempt = DeliveryAttempt::failure(503, None, Some("unavailable".into()));
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"responseCode\":503"));
        assert!(json.contains("\"errorMessage\":\"unavailable\""));
    }
}
