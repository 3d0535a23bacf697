//! Channel message types
//!
//! All inter-task communication flows through these four enums:
//! `Command` (presentation → sequencer), `Event` (transport → sequencer),
//! `Effect` (sequencer → transport) and `AppEvent` (sequencer →
//! presentation). The sequencer is the only component that sees all four,
//! which is what makes its `select!` loop the single point of ordering.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::catalog::{ServiceCatalog, ServiceDescriptor};
use crate::error::ErrorKind;
use crate::registry::DeviceSnapshot;
use crate::state::SessionState;
use crate::types::{DeviceAddress, OperationId, Rssi};

// ----------------------------------------------------------------------------
// Operation Requests
// ----------------------------------------------------------------------------

/// A GATT operation against the connected peripheral
///
/// Created by a caller and consumed exactly once by the operation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationRequest {
    /// Read the value of a characteristic
    Read { service: Uuid, characteristic: Uuid },
    /// Write a payload to a characteristic
    Write {
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
    },
    /// Enable or disable notifications for a characteristic
    SetNotify {
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    },
}

impl OperationRequest {
    pub fn service(&self) -> Uuid {
        match self {
            OperationRequest::Read { service, .. }
            | OperationRequest::Write { service, .. }
            | OperationRequest::SetNotify { service, .. } => *service,
        }
    }

    pub fn characteristic(&self) -> Uuid {
        match self {
            OperationRequest::Read { characteristic, .. }
            | OperationRequest::Write { characteristic, .. }
            | OperationRequest::SetNotify { characteristic, .. } => *characteristic,
        }
    }
}

/// Terminal outcome of an operation: a payload for reads, `None` for writes
/// and notify toggles, or the failure that ended it
pub type OperationResult = Result<Option<Vec<u8>>, ErrorKind>;

/// Responder half for a submitted operation
pub type OperationResponder = oneshot::Sender<OperationResult>;

// ----------------------------------------------------------------------------
// Command: Presentation → Sequencer
// ----------------------------------------------------------------------------

/// Commands issued by presentation collaborators
///
/// Not serializable: submissions and queries carry oneshot responders so the
/// public API can hand the caller a future instead of blocking.
#[derive(Debug)]
pub enum Command {
    /// Open a discovery window
    StartScan,
    /// Close the discovery window early (no-op when not scanning)
    StopScan,
    /// Toggle-select a device row: bind/connect, retry, or disconnect
    /// depending on the current binding (see the state machine docs)
    SelectDevice { address: DeviceAddress },
    /// Tear down the active session, whatever its state
    Disconnect,
    /// Submit a GATT operation; resolved through `respond_to`
    SubmitOperation {
        request: OperationRequest,
        respond_to: OperationResponder,
    },
    /// Snapshot of all discovered devices
    GetDevices {
        respond_to: oneshot::Sender<Vec<DeviceSnapshot>>,
    },
    /// Current service catalog for an address, if discovery has completed
    GetCatalog {
        address: DeviceAddress,
        respond_to: oneshot::Sender<Option<ServiceCatalog>>,
    },
    /// Stop the sequencer task
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Sequencer
// ----------------------------------------------------------------------------

/// Asynchronous callbacks from the transport task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Radio/adapter availability changed (also sent once at startup)
    AdapterStateChanged { available: bool },
    /// An advertisement was observed during a scan
    AdvertisementReceived {
        address: DeviceAddress,
        name: Option<String>,
        rssi: Rssi,
    },
    /// The transport could not start or continue scanning
    ScanFailed { code: i32 },
    /// A connection attempt succeeded
    Connected { address: DeviceAddress },
    /// A connection attempt failed or timed out
    ConnectFailed {
        address: DeviceAddress,
        reason: String,
    },
    /// The link to a peripheral dropped (requested or unsolicited)
    Disconnected { address: DeviceAddress },
    /// Service discovery completed with the reported tree
    ServicesDiscovered {
        address: DeviceAddress,
        services: Vec<ServiceDescriptor>,
    },
    /// Service discovery failed
    DiscoveryFailed {
        address: DeviceAddress,
        reason: String,
    },
    /// The in-flight operation finished
    OperationCompleted {
        id: OperationId,
        result: OperationResult,
    },
    /// An unsolicited characteristic value push
    NotificationReceived {
        service: Option<Uuid>,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

// ----------------------------------------------------------------------------
// Effect: Sequencer → Transport
// ----------------------------------------------------------------------------

/// Radio work requested by the sequencer
///
/// Operation effects carry the queue's `OperationId`; the transport must
/// answer each with exactly one `Event::OperationCompleted` for that id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    StartScan,
    StopScan,
    Connect {
        address: DeviceAddress,
    },
    Disconnect {
        address: DeviceAddress,
    },
    DiscoverServices {
        address: DeviceAddress,
    },
    ReadCharacteristic {
        id: OperationId,
        service: Uuid,
        characteristic: Uuid,
    },
    WriteCharacteristic {
        id: OperationId,
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
    },
    SetNotify {
        id: OperationId,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    },
}

// ----------------------------------------------------------------------------
// AppEvent: Sequencer → Presentation
// ----------------------------------------------------------------------------

/// Read-only observations for presentation collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// First sighting of an address in this session
    DeviceAdded { device: DeviceSnapshot },
    /// A known address was re-sighted or changed state
    DeviceUpdated { device: DeviceSnapshot },
    /// The discovery window opened or closed
    ScanStateChanged { scanning: bool },
    /// Scanning failed; `kind` is `ScanFailed(code)` or `TransportUnavailable`
    ScanFailed { kind: ErrorKind },
    /// The bound session changed state
    ConnectionStateChanged {
        address: DeviceAddress,
        state: SessionState,
    },
    /// A session-level failure outside the operation path
    SessionError {
        address: DeviceAddress,
        kind: ErrorKind,
    },
    /// Discovery completed and the service catalog is queryable
    CatalogReady {
        address: DeviceAddress,
        service_count: usize,
    },
    /// A submitted operation resolved (mirrors the oneshot responder)
    OperationResult {
        id: OperationId,
        request: OperationRequest,
        result: OperationResult,
    },
    /// An unsolicited notification arrived
    NotificationReceived {
        service: Option<Uuid>,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
