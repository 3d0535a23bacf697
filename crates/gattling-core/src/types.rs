//! Core types for the gattling session manager
//!
//! This module defines the fundamental identifier types used throughout the
//! crate, using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Device Address
// ----------------------------------------------------------------------------

/// Stable identifier for a peripheral (MAC address or platform equivalent)
///
/// The transport decides the concrete format; the core only requires that the
/// identifier is stable for the lifetime of a session and comparable across
/// advertisements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a new address from any string-like identifier
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Signal Strength
// ----------------------------------------------------------------------------

/// Received signal strength in dBm, as reported by an advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rssi(i16);

impl Rssi {
    /// Create a new signal strength value
    pub fn new(dbm: i16) -> Self {
        Self(dbm)
    }

    /// Signal strength in dBm
    pub fn dbm(&self) -> i16 {
        self.0
    }
}

impl fmt::Display for Rssi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dBm", self.0)
    }
}

// ----------------------------------------------------------------------------
// Operation Identifier
// ----------------------------------------------------------------------------

/// Identifier for a queued GATT operation, unique within a session
///
/// Assigned by the operation queue at submission time and carried through the
/// matching effect and completion event so the queue can pair a transport
/// completion with its in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    /// Create an operation identifier from a raw counter value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Characteristic Properties
// ----------------------------------------------------------------------------

/// GATT characteristic property bitmask
///
/// Bit assignments follow the Bluetooth Core specification (and therefore the
/// Android `BluetoothGattCharacteristic.PROPERTY_*` constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharProps(u8);

impl CharProps {
    pub const BROADCAST: CharProps = CharProps(0x01);
    pub const READ: CharProps = CharProps(0x02);
    pub const WRITE_WITHOUT_RESPONSE: CharProps = CharProps(0x04);
    pub const WRITE: CharProps = CharProps(0x08);
    pub const NOTIFY: CharProps = CharProps(0x10);
    pub const INDICATE: CharProps = CharProps(0x20);
    pub const AUTHENTICATED_SIGNED_WRITES: CharProps = CharProps(0x40);
    pub const EXTENDED_PROPERTIES: CharProps = CharProps(0x80);

    /// Create a property mask from raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get the raw bits
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether all bits of `other` are set
    pub fn contains(&self, other: CharProps) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combine two property masks
    pub fn union(&self, other: CharProps) -> CharProps {
        CharProps(self.0 | other.0)
    }

    pub fn readable(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn writable(&self) -> bool {
        self.contains(Self::WRITE) || self.contains(Self::WRITE_WITHOUT_RESPONSE)
    }

    pub fn notifiable(&self) -> bool {
        self.contains(Self::NOTIFY) || self.contains(Self::INDICATE)
    }

    /// Human-readable property list, e.g. "Read, Write, Notify"
    pub fn labels(&self) -> String {
        let mut labels = Vec::new();
        if self.contains(Self::READ) {
            labels.push("Read");
        }
        if self.contains(Self::WRITE) {
            labels.push("Write");
        }
        if self.contains(Self::WRITE_WITHOUT_RESPONSE) {
            labels.push("WriteNoResponse");
        }
        if self.contains(Self::NOTIFY) {
            labels.push("Notify");
        }
        if self.contains(Self::INDICATE) {
            labels.push("Indicate");
        }
        if self.contains(Self::BROADCAST) {
            labels.push("Broadcast");
        }
        labels.join(", ")
    }
}

impl fmt::Display for CharProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
