//! GATT protocol constants and btleplug translation helpers

use btleplug::api::CharPropFlags;
use uuid::Uuid;

use gattling_core::{CharProps, ErrorKind};

// ----------------------------------------------------------------------------
// Well-Known UUIDs
// ----------------------------------------------------------------------------

/// Client Characteristic Configuration descriptor
///
/// Writing this descriptor is what actually turns notifications on or off on
/// the peripheral; `subscribe`/`unsubscribe` perform the write internally. A
/// characteristic advertising NOTIFY without this descriptor cannot deliver.
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

// ----------------------------------------------------------------------------
// Scan Failure Codes
// ----------------------------------------------------------------------------

/// Platform scan-failure code reported when the adapter rejects a scan
pub const SCAN_FAILED_INTERNAL_ERROR: i32 = 3;

// ----------------------------------------------------------------------------
// Translation
// ----------------------------------------------------------------------------

/// Translate btleplug characteristic property flags to the core bitmask
pub fn char_props(flags: CharPropFlags) -> CharProps {
    let mut props = CharProps::default();
    if flags.contains(CharPropFlags::BROADCAST) {
        props = props.union(CharProps::BROADCAST);
    }
    if flags.contains(CharPropFlags::READ) {
        props = props.union(CharProps::READ);
    }
    if flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        props = props.union(CharProps::WRITE_WITHOUT_RESPONSE);
    }
    if flags.contains(CharPropFlags::WRITE) {
        props = props.union(CharProps::WRITE);
    }
    if flags.contains(CharPropFlags::NOTIFY) {
        props = props.union(CharProps::NOTIFY);
    }
    if flags.contains(CharPropFlags::INDICATE) {
        props = props.union(CharProps::INDICATE);
    }
    if flags.contains(CharPropFlags::AUTHENTICATED_SIGNED_WRITES) {
        props = props.union(CharProps::AUTHENTICATED_SIGNED_WRITES);
    }
    if flags.contains(CharPropFlags::EXTENDED_PROPERTIES) {
        props = props.union(CharProps::EXTENDED_PROPERTIES);
    }
    props
}

/// Translate a btleplug radio error to the nearest core error kind
///
/// Missing-attribute failures map to `NotFound`; everything that implies the
/// link is unusable maps to `ConnectionLost`.
pub fn operation_error(error: &btleplug::Error) -> ErrorKind {
    match error {
        btleplug::Error::PermissionDenied => ErrorKind::PermissionDenied,
        btleplug::Error::DeviceNotFound => ErrorKind::NotFound,
        btleplug::Error::NoSuchCharacteristic => ErrorKind::NotFound,
        btleplug::Error::UnexpectedCharacteristic => ErrorKind::NotFound,
        btleplug::Error::NotConnected => ErrorKind::ConnectionLost,
        btleplug::Error::TimedOut(_) => ErrorKind::ConnectionLost,
        _ => ErrorKind::ConnectionLost,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
