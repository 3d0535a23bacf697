//! Gattling Core Session Logic
//!
//! Transport-agnostic heart of the BLE central: the device registry, the
//! bound-session state machine, the one-in-flight GATT operation queue and
//! the sequencer task that totally orders caller commands against transport
//! events. Nothing in this crate touches a radio; a transport crate holds the
//! [`TransportLink`] end of the channel pair and turns [`Effect`]s into real
//! GATT traffic.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod catalog;
pub mod channels;
pub mod config;
pub mod error;
pub mod messages;
pub mod queue;
pub mod registry;
pub mod scan;
pub mod session;
pub mod state;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use catalog::{CharacteristicDescriptor, ServiceCatalog, ServiceDescriptor};
pub use channels::{
    AppEventReceiver, AppEventSender, CommandReceiver, CommandSender, EffectReceiver,
    EffectSender, EventReceiver, EventSender, TransportLink,
};
pub use config::{ChannelConfig, SessionConfig};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use messages::{
    AppEvent, Command, Effect, Event, OperationRequest, OperationResponder, OperationResult,
};
pub use queue::OperationQueue;
pub use registry::{DeviceRegistry, DeviceSnapshot, PeripheralRecord, Sighting};
pub use scan::ScanCoordinator;
pub use session::{spawn, PendingOperation, SessionHandle, SessionTask};
pub use state::{BoundSession, SessionInput, SessionState, Transition};
pub use types::{CharProps, DeviceAddress, OperationId, Rssi};
