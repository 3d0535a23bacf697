//! Bluetooth Low Energy transport for the Gattling session core
//!
//! This crate drives a real adapter through `btleplug`, turning the session
//! sequencer's effects into radio work and adapter callbacks into session
//! events.
//!
//! ## Architecture
//!
//! - [`error`] - Fatal transport-task error types
//! - [`protocol`] - GATT constants and btleplug translation helpers
//! - [`transport`] - The central transport task
//!
//! The transport holds the `TransportLink` returned by
//! [`gattling_core::spawn`] and runs as its own task:
//!
//! ```rust,no_run
//! use gattling_core::SessionConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (handle, mut app_events, link, _core) = gattling_core::spawn(SessionConfig::default());
//! let _transport = gattling_ble::spawn(link).await?;
//!
//! handle.start_scan().await?;
//! while let Some(app_event) = app_events.recv().await {
//!     println!("{:?}", app_event);
//! }
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod error;
pub mod protocol;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use error::{BleResult, BleTransportError};
pub use protocol::{char_props, operation_error, CCCD_UUID};
pub use transport::{spawn, BleCentralTask};
