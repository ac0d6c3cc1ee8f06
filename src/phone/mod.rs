//! Phone session facade
//!
//! [`Phone`] is the session object constructed once by the host and shared
//! by reference. It owns the credential store, the engine bring-up state
//! machine, the active/pending connection slots, and the audio router, and
//! it notifies the host through the [`crate::events`] channels.
//!
//! # Concurrency model
//!
//! One logical session per `Phone`. Credential fetches run as background
//! tasks; their completions, like every engine notification, mutate session
//! state only under the single internal mutex, which enforces the
//! single-writer discipline the state machines rely on (one bring-up at a
//! time, at most one pending incoming connection). Event handlers are always
//! invoked after the lock has been released, so a handler may call back into
//! the phone freely.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use softphone_core::credential::{HttpCredentialFetcher, LoginParams};
//! use softphone_core::phone::Phone;
//! use std::sync::Arc;
//! # use softphone_core::engine::TelephonyEngine;
//!
//! # async fn example(engine: Arc<dyn TelephonyEngine>) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpCredentialFetcher::new("https://example.com/token".parse()?);
//! let phone = Phone::builder()
//!     .with_engine(engine)
//!     .with_credential_fetcher(Arc::new(fetcher))
//!     .build()?;
//!
//! phone.login(LoginParams::new(Some("alice".to_string()), true, true)).await;
//! phone.connect(None).await;
//! # Ok(())
//! # }
//! ```

mod controller;
mod session;

pub use session::EngineState;

use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::debug;

use crate::audio::{AudioOutput, AudioRouter, NullAudioOutput};
use crate::connection::ConnectionState;
use crate::credential::CredentialFetcher;
use crate::engine::TelephonyEngine;
use crate::error::{PhoneError, PhoneResult};
use crate::events::{
    ConnectionEventHandler, DeviceEventHandler, EventDispatcher, LoginEventHandler,
};

use controller::CallController;
use session::DeviceSession;

/// All mutable session state, guarded by one mutex
pub(crate) struct PhoneState {
    pub(crate) session: DeviceSession,
    pub(crate) calls: CallController,
}

/// The phone session
///
/// See the [module documentation](self) for the concurrency model and a
/// usage example.
pub struct Phone {
    /// Self-reference handed to background tasks (credential fetches)
    pub(crate) me: Weak<Phone>,
    pub(crate) engine: Arc<dyn TelephonyEngine>,
    pub(crate) fetcher: Arc<dyn CredentialFetcher>,
    pub(crate) audio: AudioRouter,
    pub(crate) events: EventDispatcher,
    pub(crate) state: Mutex<PhoneState>,
}

impl Phone {
    /// Start building a phone session
    pub fn builder() -> PhoneBuilder {
        PhoneBuilder::new()
    }

    /// Register the login event handler, replacing the previous one
    pub async fn set_login_handler(&self, handler: Arc<dyn LoginEventHandler>) {
        self.events.set_login_handler(handler).await;
    }

    /// Register the connection event handler, replacing the previous one
    pub async fn set_connection_handler(&self, handler: Arc<dyn ConnectionEventHandler>) {
        self.events.set_connection_handler(handler).await;
    }

    /// Register the device event handler, replacing the previous one
    pub async fn set_device_handler(&self, handler: Arc<dyn DeviceEventHandler>) {
        self.events.set_device_handler(handler).await;
    }

    /// Store the speaker preference; applied immediately when it changed
    pub async fn set_speaker_enabled(&self, enabled: bool) {
        self.audio.set_speaker_enabled(enabled).await;
    }

    /// The stored speaker preference
    pub fn speaker_enabled(&self) -> bool {
        self.audio.speaker_enabled()
    }

    /// Mute or unmute the active connection; no-op without one
    pub async fn set_call_muted(&self, muted: bool) {
        let connection = {
            let state = self.state.lock().await;
            state.calls.active.as_ref().map(|slot| slot.connection.clone())
        };
        if let Some(connection) = connection {
            connection.set_muted(muted).await;
        }
    }

    /// Current engine bring-up state
    pub async fn engine_state(&self) -> EngineState {
        self.state.lock().await.session.engine_state
    }

    /// Whether the active connection is established
    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    /// State of the active connection; `Disconnected` when there is none
    pub async fn connection_state(&self) -> ConnectionState {
        self.state
            .lock()
            .await
            .calls
            .active
            .as_ref()
            .map(|slot| slot.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Whether an incoming connection is waiting to be accepted or ignored
    pub async fn has_pending_connection(&self) -> bool {
        self.state.lock().await.calls.pending.is_some()
    }

    /// Whether the engine handle advertises the outgoing capability
    ///
    /// False when no engine handle exists.
    pub async fn can_make_outgoing(&self) -> bool {
        let state = self.state.lock().await;
        state.session.handle.is_some() && state.session.capabilities.outgoing
    }

    /// Whether the engine handle advertises the incoming capability
    ///
    /// False when no engine handle exists.
    pub async fn can_accept_incoming(&self) -> bool {
        let state = self.state.lock().await;
        state.session.handle.is_some() && state.session.capabilities.incoming
    }

    /// Whether the current credential is still valid
    pub async fn credential_valid(&self) -> bool {
        self.state.lock().await.session.credentials.is_valid()
    }
}

/// Builder wiring the phone's collaborators together
///
/// The engine and credential fetcher are required; the audio output defaults
/// to [`NullAudioOutput`] and every event channel defaults to no-op.
pub struct PhoneBuilder {
    engine: Option<Arc<dyn TelephonyEngine>>,
    fetcher: Option<Arc<dyn CredentialFetcher>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    login_handler: Option<Arc<dyn LoginEventHandler>>,
    connection_handler: Option<Arc<dyn ConnectionEventHandler>>,
    device_handler: Option<Arc<dyn DeviceEventHandler>>,
}

impl PhoneBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            engine: None,
            fetcher: None,
            audio_output: None,
            login_handler: None,
            connection_handler: None,
            device_handler: None,
        }
    }

    /// Set the telephony engine (required)
    pub fn with_engine(mut self, engine: Arc<dyn TelephonyEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the credential fetcher (required)
    pub fn with_credential_fetcher(mut self, fetcher: Arc<dyn CredentialFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the platform audio output
    pub fn with_audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Set the initial login event handler
    pub fn with_login_handler(mut self, handler: Arc<dyn LoginEventHandler>) -> Self {
        self.login_handler = Some(handler);
        self
    }

    /// Set the initial connection event handler
    pub fn with_connection_handler(mut self, handler: Arc<dyn ConnectionEventHandler>) -> Self {
        self.connection_handler = Some(handler);
        self
    }

    /// Set the initial device event handler
    pub fn with_device_handler(mut self, handler: Arc<dyn DeviceEventHandler>) -> Self {
        self.device_handler = Some(handler);
        self
    }

    /// Build the phone session
    pub fn build(self) -> PhoneResult<Arc<Phone>> {
        let engine = self
            .engine
            .ok_or_else(|| PhoneError::invalid_state("a telephony engine is required"))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| PhoneError::invalid_state("a credential fetcher is required"))?;
        let output = self
            .audio_output
            .unwrap_or_else(|| Arc::new(NullAudioOutput));

        debug!("phone session constructed");
        Ok(Arc::new_cyclic(|me| Phone {
            me: me.clone(),
            engine,
            fetcher,
            audio: AudioRouter::new(output),
            events: EventDispatcher::with_handlers(
                self.login_handler,
                self.connection_handler,
                self.device_handler,
            ),
            state: Mutex::new(PhoneState {
                session: DeviceSession::new(),
                calls: CallController::new(),
            }),
        }))
    }
}

impl Default for PhoneBuilder {
    fn default() -> Self {
        Self::new()
    }
}
