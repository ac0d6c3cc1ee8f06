//! Connection types for the phone session
//!
//! A connection is one call leg, outgoing or incoming, progressing through a
//! fixed state sequence:
//!
//! ```text
//! Idle ──► Connecting ──► Connected ──► Disconnecting ──► Disconnected
//!              │                │                              ▲
//!              └────────────────┴──────────────────────────────┘
//!                  (failed attempts / abnormal termination)
//! ```
//!
//! Transitions are driven exclusively by engine notifications, never by
//! internal timers. `Disconnected` is terminal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
///
/// Assigned by the engine when the connection is created and used to route
/// engine notifications to the owning slot.
pub type ConnectionId = Uuid;

/// Direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDirection {
    /// Call placed by this phone
    Outgoing,
    /// Call received from the engine
    Incoming,
}

impl std::fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionDirection::Outgoing => write!(f, "Outgoing"),
            ConnectionDirection::Incoming => write!(f, "Incoming"),
        }
    }
}

/// State of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Created but not yet reported as connecting by the engine
    Idle,
    /// The engine is establishing the call
    Connecting,
    /// Media is flowing
    Connected,
    /// Teardown was requested; waiting for the terminal notification
    Disconnecting,
    /// Terminal state
    Disconnected,
}

impl ConnectionState {
    /// Whether the connection has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Whether the connection is still being established
    ///
    /// Used to decide how an abnormal termination is reported: a connection
    /// that never reached `Connected` failed *connecting*, an established one
    /// just failed.
    pub fn is_establishing(&self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Connecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Free-form parameters passed to the engine when placing an outgoing call
///
/// Interpreted by the engine (for example a destination number or client
/// identifier); opaque to this crate.
pub type ConnectParams = HashMap<String, String>;
