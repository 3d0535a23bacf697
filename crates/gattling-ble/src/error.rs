//! Error types for the BLE transport

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Fatal errors of the transport task itself
///
/// Per-operation radio failures are not errors at this level; they are
/// translated to [`gattling_core::ErrorKind`] and reported through
/// `Event::OperationCompleted` (or the matching failure event) instead.
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("No BLE adapters available")]
    AdapterUnavailable,

    #[error("Failed to initialize BLE manager: {0}")]
    ManagerInit(btleplug::Error),

    #[error("Failed to get BLE event stream: {0}")]
    EventStream(btleplug::Error),

    #[error("Session channel closed")]
    ChannelClosed,
}

pub type BleResult<T> = Result<T, BleTransportError>;
