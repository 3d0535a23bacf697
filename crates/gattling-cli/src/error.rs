//! Error handling for the Gattling CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Session core error: {0}")]
    Core(#[from] gattling_core::CoreError),

    #[error("Transport initialization failed: {0}")]
    Transport(#[from] gattling_ble::BleTransportError),

    #[error("Session error: {0}")]
    Session(gattling_core::ErrorKind),

    #[error("Scan failed: {0}")]
    ScanFailed(gattling_core::ErrorKind),

    #[error("Device not found: {address}")]
    DeviceNotFound { address: String },

    #[error("Session ended unexpectedly")]
    SessionEnded,

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
