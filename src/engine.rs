//! Collaborator surface of the external telephony engine
//!
//! The engine owns signaling and media transport; this crate only consumes
//! the narrow interface defined here. The traits are object-safe so that the
//! phone can hold them as `Arc<dyn ...>` and tests can substitute mocks.
//!
//! Engine notifications ([`EngineEvent`]) and the platform-delivered
//! incoming-call event ([`IncomingCallEvent`]) must be delivered to
//! [`Phone`](crate::phone::Phone) one at a time, from one logical task.
//! The phone serializes all state mutation internally, but ordering between
//! events is only meaningful if the source does not interleave them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::{ConnectParams, ConnectionId};
use crate::error::PhoneResult;

/// Capability set advertised by an engine handle
///
/// Decoded by the engine from the credential backing the handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the handle may place outgoing calls
    pub outgoing: bool,
    /// Whether the handle may receive incoming calls
    pub incoming: bool,
    /// Expiration of the backing credential, seconds since the Unix epoch
    pub expiration: Option<i64>,
}

/// Entry point into the telephony engine
#[async_trait]
pub trait TelephonyEngine: Send + Sync {
    /// Bring up an engine handle authorized by `token`
    ///
    /// Failure leaves no handle behind; the session resets to uninitialized
    /// and reports an [`EngineInit`](crate::error::PhoneError::EngineInit)
    /// login error.
    async fn create_handle(&self, token: &str) -> PhoneResult<Arc<dyn EngineHandle>>;
}

/// Live handle to the engine, capable of issuing and receiving connections
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// The capability set decoded from the handle's current credential
    async fn capabilities(&self) -> Capabilities;

    /// Replace the credential backing this handle
    async fn update_credential(&self, token: &str) -> PhoneResult<()>;

    /// Release the handle; it must not be used afterwards
    async fn release(&self);

    /// Issue an outgoing connection
    ///
    /// `None` means the engine refused to create the connection; this is
    /// reported synchronously as a failed-connecting error without touching
    /// the active slot.
    async fn connect(&self, params: ConnectParams) -> Option<Arc<dyn EngineConnection>>;
}

/// One call leg owned by the engine
///
/// All control methods are best-effort requests; the authoritative outcome
/// arrives later as an [`EngineEvent`] carrying this connection's id.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Identity used to route notifications to the owning slot
    fn id(&self) -> ConnectionId;

    /// Accept this (incoming) connection
    async fn accept(&self);

    /// Reject this (incoming) connection without answering
    async fn ignore(&self);

    /// Request teardown of this connection
    async fn disconnect(&self);

    /// Mute or unmute the microphone for this connection
    async fn set_muted(&self, muted: bool);
}

/// Notifications delivered by the engine about connections and the device
///
/// Fed into [`Phone::process_engine_event`](crate::phone::Phone::process_engine_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The connection started establishing
    Connecting(ConnectionId),
    /// The connection is established and media is flowing
    Connected(ConnectionId),
    /// The connection terminated normally
    Disconnected(ConnectionId),
    /// The connection terminated abnormally
    DisconnectedWithError {
        /// Connection that failed
        id: ConnectionId,
        /// Engine-defined error code
        code: i32,
        /// Human-readable failure description
        message: String,
    },
    /// The device started listening for incoming calls
    StartedListening,
    /// The device stopped listening, optionally because of an error
    StoppedListening {
        /// Failure description, absent for an orderly stop
        error: Option<String>,
    },
}

/// Platform-delivered incoming call, decoded once at the boundary
///
/// Carries the connection reference and a per-delivery event id. The phone
/// consumes each event at most once: re-delivery of the same `event_id` is
/// ignored, not re-processed.
#[derive(Clone)]
pub struct IncomingCallEvent {
    /// Identity of this delivery, used to suppress duplicate processing
    pub event_id: Uuid,
    /// The new incoming connection
    pub connection: Arc<dyn EngineConnection>,
}

impl IncomingCallEvent {
    /// Wrap a freshly surfaced incoming connection in a new event
    pub fn new(connection: Arc<dyn EngineConnection>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            connection,
        }
    }
}

impl std::fmt::Debug for IncomingCallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingCallEvent")
            .field("event_id", &self.event_id)
            .field("connection", &self.connection.id())
            .finish()
    }
}
