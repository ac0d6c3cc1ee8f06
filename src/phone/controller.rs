//! Call arbitration: one active connection, at most one pending incoming
//!
//! The controller owns two disjoint slots. `connect`, `disconnect`,
//! `accept_connection` and `ignore_incoming_connection` issue best-effort
//! requests to the engine; a slot is only authoritatively cleared when the
//! matching terminal notification arrives, never optimistically. Engine
//! notifications are routed by connection identity - notifications for a
//! connection owned by neither slot are ignored.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::{ConnectParams, ConnectionDirection, ConnectionId, ConnectionState};
use crate::engine::{EngineConnection, EngineEvent, IncomingCallEvent};
use crate::error::PhoneError;

use super::session::EngineState;
use super::Phone;

/// One occupied connection slot
pub(crate) struct Slot {
    pub(crate) id: ConnectionId,
    pub(crate) connection: Arc<dyn EngineConnection>,
    pub(crate) state: ConnectionState,
    pub(crate) direction: ConnectionDirection,
}

impl Slot {
    fn new(connection: Arc<dyn EngineConnection>, direction: ConnectionDirection) -> Self {
        Self {
            id: connection.id(),
            connection,
            state: ConnectionState::Idle,
            direction,
        }
    }
}

/// The two connection slots plus incoming-event bookkeeping
pub(crate) struct CallController {
    pub(crate) active: Option<Slot>,
    pub(crate) pending: Option<Slot>,
    /// Ids of every consumed incoming event; re-deliveries are ignored
    pub(crate) consumed_incoming_events: HashSet<Uuid>,
}

impl CallController {
    pub(crate) fn new() -> Self {
        Self {
            active: None,
            pending: None,
            consumed_incoming_events: HashSet::new(),
        }
    }

    /// Mark the active connection as disconnecting and hand out its engine
    /// reference so teardown can be requested outside the lock
    fn begin_active_teardown(&mut self) -> Option<Arc<dyn EngineConnection>> {
        self.active.as_mut().map(|slot| {
            slot.state = ConnectionState::Disconnecting;
            slot.connection.clone()
        })
    }
}

/// How a connection notification was routed
enum Routed {
    Active { was_establishing: bool },
    Pending,
    Unknown,
}

impl Phone {
    /// Place an outgoing call
    ///
    /// While the engine is initializing the request is remembered (one
    /// deferred connect, later requests overwrite) and replayed once the
    /// engine is ready. An invalid credential triggers a background refresh
    /// first; the call then proceeds against the existing engine handle.
    /// Without the outgoing capability this is a silent no-op. An existing
    /// active connection is torn down first, its disconnecting notification
    /// firing before the new connection is issued.
    pub async fn connect(&self, params: Option<ConnectParams>) {
        let (needs_refresh, last_params) = {
            let mut state = self.state.lock().await;
            if state.session.engine_state == EngineState::Initializing {
                debug!("engine initializing; deferring connect");
                state.session.deferred_connect = true;
                return;
            }
            (
                !state.session.credentials.is_valid(),
                state.session.params.clone(),
            )
        };

        if needs_refresh {
            debug!("credential invalid; refreshing before connect");
            self.login(last_params.unwrap_or_default()).await;
        }

        let (handle, teardown) = {
            let mut state = self.state.lock().await;
            let Some(handle) = state.session.handle.clone() else {
                debug!("no engine handle; dropping connect");
                return;
            };
            if !state.session.capabilities.outgoing {
                debug!("outgoing capability not granted; ignoring connect");
                return;
            }
            (handle, state.calls.begin_active_teardown())
        };

        if let Some(old) = teardown {
            old.disconnect().await;
            self.events.connection().await.on_disconnecting().await;
        }

        match handle.connect(params.unwrap_or_default()).await {
            Some(connection) => {
                let slot = Slot::new(connection, ConnectionDirection::Outgoing);
                info!(id = %slot.id, direction = %slot.direction, "connection issued");
                let mut state = self.state.lock().await;
                state.calls.active = Some(slot);
            }
            None => {
                warn!("engine refused to create outgoing connection");
                self.events
                    .connection()
                    .await
                    .on_failed_connecting(PhoneError::connection_create(
                        "couldn't create new connection",
                    ))
                    .await;
            }
        }
    }

    /// Request teardown of the active connection
    ///
    /// Notifies `on_disconnecting`; the slot itself is cleared when the
    /// terminal notification arrives.
    pub async fn disconnect(&self) {
        let teardown = {
            let mut state = self.state.lock().await;
            state.calls.begin_active_teardown()
        };
        if let Some(connection) = teardown {
            connection.disconnect().await;
            self.events.connection().await.on_disconnecting().await;
        }
    }

    /// Accept the pending incoming connection and promote it to active
    ///
    /// No-op without a pending connection. An existing active connection is
    /// disconnected first; its disconnecting notification fires before the
    /// pending connection is accepted.
    pub async fn accept_connection(&self) {
        let (pending, teardown) = {
            let mut state = self.state.lock().await;
            let Some(pending) = state.calls.pending.take() else {
                debug!("no pending incoming connection to accept");
                return;
            };
            let teardown = state.calls.begin_active_teardown();
            // Promote before awaiting the engine so notifications for the
            // promoted connection route to the active slot.
            let connection = pending.connection.clone();
            state.calls.active = Some(pending);
            (connection, teardown)
        };

        if let Some(old) = teardown {
            old.disconnect().await;
            self.events.connection().await.on_disconnecting().await;
        }

        info!("accepting incoming connection");
        pending.accept().await;
    }

    /// Reject the pending incoming connection without promoting it
    ///
    /// Best-effort request; the pending slot is cleared by the terminal
    /// notification, not here.
    pub async fn ignore_incoming_connection(&self) {
        let pending = {
            let state = self.state.lock().await;
            state.calls.pending.as_ref().map(|slot| slot.connection.clone())
        };
        if let Some(connection) = pending {
            info!("ignoring pending incoming connection");
            connection.ignore().await;
        }
    }

    /// Handle a platform-delivered incoming call event
    ///
    /// Returns `true` when the connection was taken as the pending incoming
    /// connection. A duplicate delivery of an already consumed event and a
    /// second incoming call while one is pending both return `false`; the
    /// latter is rejected immediately.
    pub async fn handle_incoming(&self, event: IncomingCallEvent) -> bool {
        let reject = {
            let mut state = self.state.lock().await;
            if !state.calls.consumed_incoming_events.insert(event.event_id) {
                debug!(event_id = %event.event_id, "incoming event already consumed; ignoring");
                return false;
            }

            if state.calls.pending.is_some() {
                info!("a pending incoming connection already exists");
                true
            } else {
                let slot = Slot::new(event.connection.clone(), ConnectionDirection::Incoming);
                info!(id = %slot.id, direction = %slot.direction, "incoming connection pending");
                state.calls.pending = Some(slot);
                false
            }
        };

        if reject {
            event.connection.ignore().await;
            return false;
        }
        true
    }

    /// Apply an engine notification to the session
    ///
    /// Completions must be serialized onto one logical task before being
    /// delivered here; see the [module documentation](super).
    pub async fn process_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Connecting(id) => self.on_connecting(id).await,
            EngineEvent::Connected(id) => self.on_connected(id).await,
            EngineEvent::Disconnected(id) => self.on_disconnected(id, None).await,
            EngineEvent::DisconnectedWithError { id, code, message } => {
                self.on_disconnected(id, Some(PhoneError::connection_runtime(code, message)))
                    .await
            }
            EngineEvent::StartedListening => {
                info!("device started listening for incoming calls");
                self.events.device().await.on_started_listening().await;
            }
            EngineEvent::StoppedListening { error } => {
                info!(?error, "device stopped listening");
                self.events.device().await.on_stopped_listening(error).await;
            }
        }
    }

    async fn on_connecting(&self, id: ConnectionId) {
        let routed = {
            let mut state = self.state.lock().await;
            match state.calls.active.as_mut() {
                Some(slot) if slot.id == id => {
                    slot.state = ConnectionState::Connecting;
                    true
                }
                _ => false,
            }
        };
        if routed {
            self.events.connection().await.on_connecting().await;
        } else {
            debug!(%id, "connecting notification for unowned connection; ignoring");
        }
    }

    async fn on_connected(&self, id: ConnectionId) {
        let routed = {
            let mut state = self.state.lock().await;
            match state.calls.active.as_mut() {
                Some(slot) if slot.id == id => {
                    slot.state = ConnectionState::Connected;
                    true
                }
                _ => false,
            }
        };
        if routed {
            // Platforms may reset the route during call setup.
            self.audio.apply().await;
            self.events.connection().await.on_connected().await;
        } else {
            debug!(%id, "connected notification for unowned connection; ignoring");
        }
    }

    async fn on_disconnected(&self, id: ConnectionId, error: Option<PhoneError>) {
        let routed = {
            let mut state = self.state.lock().await;
            let calls = &mut state.calls;
            if calls.active.as_ref().is_some_and(|slot| slot.id == id) {
                let was_establishing = match calls.active.take() {
                    Some(slot) => {
                        debug!(%id, direction = %slot.direction,
                               "active connection reached its terminal state");
                        slot.state.is_establishing()
                    }
                    None => false,
                };
                Routed::Active { was_establishing }
            } else if calls.pending.as_ref().is_some_and(|slot| slot.id == id) {
                calls.pending = None;
                Routed::Pending
            } else {
                Routed::Unknown
            }
        };

        match routed {
            Routed::Active { was_establishing } => {
                let handler = self.events.connection().await;
                match error {
                    None => handler.on_disconnected().await,
                    Some(error) if was_establishing => {
                        handler.on_failed_connecting(error).await
                    }
                    Some(error) => handler.on_failed(error).await,
                }
            }
            Routed::Pending => {
                self.events.connection().await.on_incoming_disconnected().await;
            }
            Routed::Unknown => {
                debug!(%id, "terminal notification for unowned connection; ignoring");
            }
        }
    }
}
