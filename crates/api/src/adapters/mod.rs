//! Vendor adapters.
//!
//! An adapter performs exactly one HTTP attempt against an external vendor
//! and classifies the outcome. Vendor-specific quirks (auth refresh, payload
//! envelopes) live behind this trait so the delivery worker stays
//! vendor-agnostic.

mod generic;
mod registry;

pub use generic::{GenericHttpAdapter, GENERIC_VENDOR_NAME};
pub use registry::{AdapterRegistry, RegistryError};

use async_trait::async_trait;

use domain::models::{DeliveryResult, Notification};

/// Contract for external vendor API adapters.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// The vendor name this adapter handles.
    fn vendor_name(&self) -> &str;

    /// Performs one delivery attempt. All transport and protocol errors are
    /// absorbed into the returned [`DeliveryResult`]; one call is one
    /// attempt, with no internal retries.
    async fn deliver(&self, notification: &Notification) -> DeliveryResult;

    /// Whether a failed result may succeed on a later attempt. The default
    /// matches [`DeliveryResult::is_retryable`]; vendors with bespoke error
    /// contracts can inspect the response body and override.
    fn is_retryable(&self, status_code: u16, _response_body: Option<&str>) -> bool {
        status_code == 0 || status_code == 429 || status_code >= 500
    }
}
