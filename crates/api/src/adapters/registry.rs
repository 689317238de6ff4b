//! Vendor adapter registry.
//!
//! Routes notifications to the appropriate adapter by vendor name, falling
//! back to the `"generic"` adapter for unknown vendors.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::adapters::{VendorAdapter, GENERIC_VENDOR_NAME};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no default adapter named '{GENERIC_VENDOR_NAME}' is registered")]
    MissingDefaultAdapter,
}

/// Immutable lookup table from vendor name to adapter. Built once at
/// startup and shared read-only across workers.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn VendorAdapter>>,
    default_adapter: Option<Arc<dyn VendorAdapter>>,
}

impl AdapterRegistry {
    /// Builds the registry from the available adapters.
    ///
    /// Fails fast when adapters are present but none of them is the generic
    /// fallback; a registry without a fallback would silently drop unknown
    /// vendors at delivery time instead.
    pub fn new(adapter_list: Vec<Arc<dyn VendorAdapter>>) -> Result<Self, RegistryError> {
        let mut adapters = HashMap::with_capacity(adapter_list.len());
        for adapter in adapter_list {
            adapters.insert(adapter.vendor_name().to_string(), adapter);
        }

        let default_adapter = adapters.get(GENERIC_VENDOR_NAME).cloned();
        if default_adapter.is_none() && !adapters.is_empty() {
            return Err(RegistryError::MissingDefaultAdapter);
        }

        Ok(Self {
            adapters,
            default_adapter,
        })
    }

    /// Resolves the adapter for a vendor, falling back to the generic one.
    pub fn get(&self, vendor_name: &str) -> Option<Arc<dyn VendorAdapter>> {
        self.adapters
            .get(vendor_name)
            .or(self.default_adapter.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::models::{DeliveryResult, Notification};

    struct StaticAdapter {
        name: &'static str,
    }

    #[async_trait]
    impl VendorAdapter for StaticAdapter {
        fn vendor_name(&self) -> &str {
            self.name
        }

        async fn deliver(&self, _notification: &Notification) -> DeliveryResult {
            DeliveryResult::success(200, None)
        }
    }

    fn adapter(name: &'static str) -> Arc<dyn VendorAdapter> {
        Arc::new(StaticAdapter { name })
    }

    #[test]
    fn test_resolves_registered_vendor() {
        let registry =
            AdapterRegistry::new(vec![adapter("generic"), adapter("payments")]).unwrap();
        let resolved = registry.get("payments").unwrap();
        assert_eq!(resolved.vendor_name(), "payments");
    }

    #[test]
    fn test_unknown_vendor_falls_back_to_generic() {
        let registry =
            AdapterRegistry::new(vec![adapter("generic"), adapter("payments")]).unwrap();
        let resolved = registry.get("unknown-vendor").unwrap();
        assert_eq!(resolved.vendor_name(), "generic");
    }

    #[test]
    fn test_construction_fails_without_generic() {
        let result = AdapterRegistry::new(vec![adapter("payments")]);
        assert!(matches!(result, Err(RegistryError::MissingDefaultAdapter)));
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = AdapterRegistry::new(Vec::new()).unwrap();
        assert!(registry.get("generic").is_none());
    }
}
