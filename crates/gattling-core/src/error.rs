//! Error types for the gattling session core
//!
//! `ErrorKind` is the caller-visible error vocabulary: every failure a
//! session can report to presentation code or an operation submitter is one
//! of these. `CoreError` covers crate plumbing (closed channels, a session
//! task that has gone away) and wraps `ErrorKind` for operation results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Caller-Visible Error Kinds
// ----------------------------------------------------------------------------

/// Session-level failures surfaced to callers as events or operation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The radio is off or no adapter is present
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// The caller lacks authorization to operate the transport
    #[error("Permission denied")]
    PermissionDenied,

    /// A connect was requested while another session is active
    #[error("Another session is active")]
    SessionBusy,

    /// The transport reported a failed or timed-out connection attempt
    #[error("Connection attempt failed")]
    ConnectFailed,

    /// Service discovery failed; the session was torn down
    #[error("Service discovery failed")]
    DiscoveryFailed,

    /// An operation was submitted while the session was not ready
    #[error("Not connected")]
    NotConnected,

    /// Unknown service or characteristic UUID
    #[error("Service or characteristic not found")]
    NotFound,

    /// The link dropped while requests were pending or in flight
    #[error("Connection lost")]
    ConnectionLost,

    /// The transport reported a scan failure with its own error code
    #[error("Scan failed with transport code {0}")]
    ScanFailed(i32),
}

// ----------------------------------------------------------------------------
// Crate-Internal Errors
// ----------------------------------------------------------------------------

/// Errors produced by the session plumbing itself
#[derive(Debug, Error)]
pub enum CoreError {
    /// A submitted operation resolved with a session-level failure
    #[error("Operation failed: {0}")]
    Operation(#[from] ErrorKind),

    /// The session task has stopped; its command channel is closed
    #[error("Session task is no longer running")]
    SessionGone,

    /// The effect channel to the transport task is closed
    #[error("Effect channel closed")]
    EffectChannelClosed,

    /// The app event channel to presentation observers is closed
    #[error("App event channel closed")]
    AppEventChannelClosed,
}

/// Result type used throughout the core crate
pub type CoreResult<T> = Result<T, CoreError>;
