//! Generic HTTP adapter for standard RESTful vendors.
//!
//! Sends the notification's URL, method, headers, and body verbatim.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tracing::{debug, warn};

use domain::models::{DeliveryResult, HttpMethod, Notification};

use crate::adapters::VendorAdapter;

/// Vendor name of the default adapter.
pub const GENERIC_VENDOR_NAME: &str = "generic";

/// Adapter that speaks plain HTTP with no vendor-specific framing.
pub struct GenericHttpAdapter {
    client: Client,
}

impl GenericHttpAdapter {
    /// Creates an adapter whose requests are bounded by `timeout`
    /// (connect + read).
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl VendorAdapter for GenericHttpAdapter {
    fn vendor_name(&self) -> &str {
        GENERIC_VENDOR_NAME
    }

    async fn deliver(&self, notification: &Notification) -> DeliveryResult {
        debug!(
            notification_id = %notification.id,
            target_url = %notification.target_url,
            method = %notification.http_method,
            "Delivering notification"
        );

        let headers = match build_header_map(&notification.headers) {
            Ok(headers) => headers,
            Err(message) => {
                warn!(notification_id = %notification.id, error = %message, "Invalid headers");
                return DeliveryResult::connection_failure(message);
            }
        };

        let mut request = self
            .client
            .request(to_reqwest_method(notification.http_method), &notification.target_url)
            .headers(headers);
        if let Some(body) = &notification.body {
            request = request.body(body.clone());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.ok();

                if (200..300).contains(&status) {
                    DeliveryResult::success(status, body)
                } else {
                    DeliveryResult::failure(
                        status,
                        body,
                        format!("Received non-success status: {}", status),
                    )
                }
            }
            Err(err) => DeliveryResult::connection_failure(format!("Connection failed: {}", err)),
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn build_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|_| format!("Invalid header name: {}", name))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|_| format!("Invalid header value for {}", name))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GenericHttpAdapter {
        GenericHttpAdapter::new(Duration::from_secs(5))
    }

    #[test]
    fn test_vendor_name() {
        assert_eq!(adapter().vendor_name(), "generic");
    }

    #[test]
    fn test_retryable_classification() {
        let adapter = adapter();
        assert!(adapter.is_retryable(0, None));
        assert!(adapter.is_retryable(429, None));
        assert!(adapter.is_retryable(500, None));
        assert!(adapter.is_retryable(503, Some("unavailable")));
        assert!(!adapter.is_retryable(400, None));
        assert!(!adapter.is_retryable(404, None));
        assert!(!adapter.is_retryable(422, Some("rejected")));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(HttpMethod::Get), Method::GET);
        assert_eq!(to_reqwest_method(HttpMethod::Post), Method::POST);
        assert_eq!(to_reqwest_method(HttpMethod::Put), Method::PUT);
        assert_eq!(to_reqwest_method(HttpMethod::Patch), Method::PATCH);
        assert_eq!(to_reqwest_method(HttpMethod::Delete), Method::DELETE);
    }

    #[test]
    fn test_build_header_map() {
        let mut headers = HashMap::new();
        headers.insert("X-Token".to_string(), "abc".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let map = build_header_map(&headers).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-token").unwrap(), "abc");
    }

    #[test]
    fn test_build_header_map_rejects_invalid_name() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "value".to_string());
        assert!(build_header_map(&headers).is_err());
    }

    #[test]
    fn test_build_header_map_rejects_invalid_value() {
        let mut headers = HashMap::new();
        headers.insert("X-Token".to_string(), "line\nbreak".to_string());
        assert!(build_header_map(&headers).is_err());
    }
}
