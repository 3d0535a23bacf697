//! Device Registry
//!
//! Holds one record per peripheral sighted during this session, keyed by
//! address. Records are created on first advertisement, updated in place on
//! re-sighting or state change, and never removed while the session lives.
//! Only the scan coordinator and the sequencer mutate the registry;
//! presentation code sees cloneable snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::ServiceCatalog;
use crate::state::SessionState;
use crate::types::{DeviceAddress, Rssi};

// ----------------------------------------------------------------------------
// Peripheral Record
// ----------------------------------------------------------------------------

/// Everything known about one sighted peripheral
#[derive(Debug, Clone)]
pub struct PeripheralRecord {
    address: DeviceAddress,
    name: Option<String>,
    rssi: Rssi,
    state: SessionState,
    services: Option<ServiceCatalog>,
}

impl PeripheralRecord {
    fn new(address: DeviceAddress, name: Option<String>, rssi: Rssi) -> Self {
        Self {
            address,
            name,
            rssi,
            state: SessionState::Idle,
            services: None,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rssi(&self) -> Rssi {
        self.rssi
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Catalog of discovered services, present only while the record has
    /// completed discovery in its current connection epoch
    pub fn services(&self) -> Option<&ServiceCatalog> {
        self.services.as_ref()
    }

    /// Cheap cloneable view for presentation collaborators
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            address: self.address.clone(),
            name: self.name.clone(),
            rssi: self.rssi,
            state: self.state,
            service_count: self.services.as_ref().map(|c| c.service_count()),
        }
    }
}

/// Read-only copy of a record, safe to hand across the app-event channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub address: DeviceAddress,
    pub name: Option<String>,
    pub rssi: Rssi,
    pub state: SessionState,
    /// `Some` once discovery has completed for this record
    pub service_count: Option<usize>,
}

impl DeviceSnapshot {
    /// Display name, falling back like the source UI does
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Device")
    }
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Whether an advertisement created a record or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    Added,
    Updated,
}

/// All peripherals sighted during this session, deduplicated by address
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceAddress, PeripheralRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertisement sighting
    ///
    /// Inserts a fresh record on the first sighting of an address and updates
    /// signal strength (and name, if newly learned) in place afterwards. A
    /// given address therefore produces `Sighting::Added` at most once per
    /// session.
    pub fn observe(
        &mut self,
        address: DeviceAddress,
        name: Option<String>,
        rssi: Rssi,
    ) -> Sighting {
        match self.devices.entry(address.clone()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                debug!(%address, ?name, %rssi, "discovered new peripheral");
                entry.insert(PeripheralRecord::new(address, name, rssi));
                Sighting::Added
            }
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.rssi = rssi;
                if record.name.is_none() {
                    record.name = name;
                }
                Sighting::Updated
            }
        }
    }

    pub fn get(&self, address: &DeviceAddress) -> Option<&PeripheralRecord> {
        self.devices.get(address)
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.devices.contains_key(address)
    }

    /// Update the connection-state field of a record
    pub fn set_state(&mut self, address: &DeviceAddress, state: SessionState) {
        if let Some(record) = self.devices.get_mut(address) {
            record.state = state;
        }
    }

    /// Attach a freshly built catalog to a record, replacing any previous one
    pub fn attach_services(&mut self, address: &DeviceAddress, catalog: ServiceCatalog) {
        if let Some(record) = self.devices.get_mut(address) {
            record.services = Some(catalog);
        }
    }

    /// Discard the catalog when the connection epoch ends
    pub fn clear_services(&mut self, address: &DeviceAddress) {
        if let Some(record) = self.devices.get_mut(address) {
            record.services = None;
        }
    }

    /// Snapshots of every known record, in unspecified order
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        self.devices.values().map(PeripheralRecord::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::new(s)
    }

    #[test]
    fn test_dedup_by_address() {
        let mut registry = DeviceRegistry::new();

        let first = registry.observe(addr("AA:BB"), None, Rssi::new(-60));
        let second = registry.observe(addr("AA:BB"), None, Rssi::new(-55));

        assert_eq!(first, Sighting::Added);
        assert_eq!(second, Sighting::Updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&addr("AA:BB")).unwrap().rssi(), Rssi::new(-55));
    }

    #[test]
    fn test_name_learned_on_resighting() {
        let mut registry = DeviceRegistry::new();
        registry.observe(addr("AA:BB"), None, Rssi::new(-60));
        registry.observe(addr("AA:BB"), Some("Thermometer".into()), Rssi::new(-58));

        assert_eq!(
            registry.get(&addr("AA:BB")).unwrap().name(),
            Some("Thermometer")
        );
    }

    #[test]
    fn test_state_and_services_lifecycle() {
        let mut registry = DeviceRegistry::new();
        registry.observe(addr("AA:BB"), None, Rssi::new(-60));

        registry.set_state(&addr("AA:BB"), SessionState::Ready);
        registry.attach_services(&addr("AA:BB"), ServiceCatalog::new(Vec::new()));
        assert!(registry.get(&addr("AA:BB")).unwrap().services().is_some());

        registry.clear_services(&addr("AA:BB"));
        registry.set_state(&addr("AA:BB"), SessionState::Idle);
        let record = registry.get(&addr("AA:BB")).unwrap();
        assert!(record.services().is_none());
        assert_eq!(record.state(), SessionState::Idle);
    }

    #[test]
    fn test_snapshot_display_name_fallback() {
        let mut registry = DeviceRegistry::new();
        registry.observe(addr("AA:BB"), None, Rssi::new(-60));
        let snapshot = &registry.snapshots()[0];
        assert_eq!(snapshot.display_name(), "Unknown Device");
        assert_eq!(snapshot.service_count, None);
    }
}
