//! Service Catalog
//!
//! An immutable snapshot of the service/characteristic tree reported by one
//! successful discovery. The catalog is built wholesale when discovery
//! completes, queried read-only while the session is ready, and discarded on
//! disconnect. It is never merged or patched incrementally; a re-discovery
//! replaces it entirely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::types::CharProps;

// ----------------------------------------------------------------------------
// Descriptors
// ----------------------------------------------------------------------------

/// One characteristic within a discovered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub properties: CharProps,
}

/// One discovered GATT service and its characteristics, in reported order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

/// Read-only lookup over the services of the currently connected peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Build a catalog from the transport's reported service tree
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    /// All services, in the order the transport reported them
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Look up a characteristic by (service, characteristic) UUID pair
    pub fn find(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<&CharacteristicDescriptor, ErrorKind> {
        self.services
            .iter()
            .find(|s| s.uuid == service)
            .and_then(|s| s.characteristics.iter().find(|c| c.uuid == characteristic))
            .ok_or(ErrorKind::NotFound)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> ServiceCatalog {
        let svc = Uuid::from_u128(0x1800);
        let chr = Uuid::from_u128(0x2a00);
        ServiceCatalog::new(vec![ServiceDescriptor {
            uuid: svc,
            characteristics: vec![CharacteristicDescriptor {
                uuid: chr,
                properties: CharProps::READ,
            }],
        }])
    }

    #[test]
    fn test_find_known_pair() {
        let catalog = sample_catalog();
        let descriptor = catalog
            .find(Uuid::from_u128(0x1800), Uuid::from_u128(0x2a00))
            .unwrap();
        assert!(descriptor.properties.readable());
    }

    #[test]
    fn test_find_unknown_service() {
        let catalog = sample_catalog();
        let err = catalog
            .find(Uuid::from_u128(0xdead), Uuid::from_u128(0x2a00))
            .unwrap_err();
        assert_eq!(err, ErrorKind::NotFound);
    }

    #[test]
    fn test_find_unknown_characteristic() {
        let catalog = sample_catalog();
        let err = catalog
            .find(Uuid::from_u128(0x1800), Uuid::from_u128(0xbeef))
            .unwrap_err();
        assert_eq!(err, ErrorKind::NotFound);
    }
}
