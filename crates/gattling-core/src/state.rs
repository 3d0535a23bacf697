//! Connection State Machine
//!
//! Models the lifecycle of the single active session as a linear state
//! machine: a `BoundSession` pairs the targeted address with its current
//! state and is consumed on every transition, so stale handles cannot apply
//! transitions out of order. Transitions return the effects the transport
//! must execute; the sequencer in [`crate::session`] is the only caller.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::messages::Effect;
use crate::types::DeviceAddress;

// ----------------------------------------------------------------------------
// Session States
// ----------------------------------------------------------------------------

/// Lifecycle state of the bound peripheral
///
/// Exactly one peripheral may be in a non-`Idle` state at a time; all other
/// known peripherals are implicitly `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Discovering,
    Ready,
    Disconnecting,
}

impl SessionState {
    /// True once a transport-level link exists (or existed until teardown)
    pub fn has_live_link(&self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::Discovering | SessionState::Ready
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Discovering => "Discovering",
            SessionState::Ready => "Ready",
            SessionState::Disconnecting => "Disconnecting",
        };
        write!(f, "{}", name)
    }
}

// ----------------------------------------------------------------------------
// State Transition Inputs
// ----------------------------------------------------------------------------

/// Inputs that drive session state transitions
///
/// `ConnectRequested` and `DisconnectRequested` originate from caller
/// commands; the rest are transport callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    ConnectRequested,
    TransportConnected,
    TransportConnectFailed,
    DiscoveryStarted,
    DiscoveryComplete,
    DiscoveryFailed,
    DisconnectRequested,
    TransportDisconnected,
}

// ----------------------------------------------------------------------------
// Bound Session
// ----------------------------------------------------------------------------

/// The single mutable session token: the targeted address plus its state
///
/// Only the sequencer owns one of these; other components see the address
/// and state as read-only copies. Dropping the token (a transition yielding
/// `session: None`) is the only way a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSession {
    address: DeviceAddress,
    state: SessionState,
}

/// Result of applying an input to a bound session
#[derive(Debug)]
pub struct Transition {
    /// The session after the transition; `None` means the binding dissolved
    /// and the peripheral is back to implicit `Idle`
    pub session: Option<BoundSession>,
    /// Effects the transport must execute as a result of this transition
    pub effects: Vec<Effect>,
}

/// An input arrived that the current state has no transition for
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition from {state} on {input:?}")]
pub struct InvalidTransition {
    pub state: SessionState,
    pub input: SessionInput,
}

impl BoundSession {
    /// Bind a new session to an address, starting at `Idle`
    pub fn bind(address: DeviceAddress) -> Self {
        Self {
            address,
            state: SessionState::Idle,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply an input, consuming the session token
    ///
    /// An unsolicited `TransportDisconnected` is accepted from any non-Idle
    /// state; link loss can happen at any point in the lifecycle.
    pub fn transition(self, input: SessionInput) -> Result<Transition, InvalidTransition> {
        let address = self.address.clone();

        let (next, effects) = match (self.state, &input) {
            (SessionState::Idle, SessionInput::ConnectRequested) => (
                Some(SessionState::Connecting),
                vec![Effect::Connect {
                    address: address.clone(),
                }],
            ),

            // A repeated connect request while still connecting is a retry,
            // not a disconnect: no live link exists yet.
            (SessionState::Connecting, SessionInput::ConnectRequested) => (
                Some(SessionState::Connecting),
                vec![Effect::Connect {
                    address: address.clone(),
                }],
            ),

            // Connection success immediately requests service discovery.
            (SessionState::Connecting, SessionInput::TransportConnected) => (
                Some(SessionState::Connected),
                vec![Effect::DiscoverServices {
                    address: address.clone(),
                }],
            ),

            (SessionState::Connecting, SessionInput::TransportConnectFailed) => {
                // The binding survives so a re-click retries the same device.
                (Some(SessionState::Idle), Vec::new())
            }

            (SessionState::Connected, SessionInput::DiscoveryStarted) => {
                (Some(SessionState::Discovering), Vec::new())
            }

            (SessionState::Discovering, SessionInput::DiscoveryComplete) => {
                (Some(SessionState::Ready), Vec::new())
            }

            // Discovery failure tears the session down like a disconnect.
            (SessionState::Discovering, SessionInput::DiscoveryFailed) => (
                None,
                vec![Effect::Disconnect {
                    address: address.clone(),
                }],
            ),

            (
                SessionState::Connecting
                | SessionState::Connected
                | SessionState::Discovering
                | SessionState::Ready,
                SessionInput::DisconnectRequested,
            ) => (
                Some(SessionState::Disconnecting),
                vec![Effect::Disconnect {
                    address: address.clone(),
                }],
            ),

            // Link loss is accepted from any non-Idle state.
            (
                SessionState::Connecting
                | SessionState::Connected
                | SessionState::Discovering
                | SessionState::Ready
                | SessionState::Disconnecting,
                SessionInput::TransportDisconnected,
            ) => (None, Vec::new()),

            (state, _) => {
                return Err(InvalidTransition { state, input });
            }
        };

        Ok(Transition {
            session: next.map(|state| BoundSession { address, state }),
            effects,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
