//! Event sink for phone session notifications
//!
//! Three independent callback channels - login lifecycle, connection
//! lifecycle, and device lifecycle - each registerable on its own. Every
//! trait method has a no-op default, so handlers implement only the events
//! they care about and the phone never needs null checks before notifying.
//!
//! Handlers are owned by the caller; the phone only holds `Arc` references
//! and replaces them atomically when a new handler is registered.
//!
//! # Usage Examples
//!
//! ```rust
//! use softphone_core::events::ConnectionEventHandler;
//! use async_trait::async_trait;
//!
//! struct Ui;
//!
//! #[async_trait]
//! impl ConnectionEventHandler for Ui {
//!     async fn on_connected(&self) {
//!         println!("call established");
//!     }
//!     // every other event falls back to the no-op default
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PhoneError;

/// Login lifecycle notifications
#[async_trait]
pub trait LoginEventHandler: Send + Sync {
    /// A login was requested; credential fetch and bring-up may follow
    async fn on_login_started(&self) {}
    /// The engine is ready with a fresh credential
    async fn on_login_finished(&self) {}
    /// Credential fetch or engine bring-up failed
    async fn on_login_error(&self, _error: PhoneError) {}
}

/// Connection lifecycle notifications
///
/// Events for the active connection, plus `on_incoming_disconnected` for a
/// pending incoming connection that ended before it was accepted.
#[async_trait]
pub trait ConnectionEventHandler: Send + Sync {
    /// The active connection started establishing
    async fn on_connecting(&self) {}
    /// The active connection is established
    async fn on_connected(&self) {}
    /// The connection could not be established
    async fn on_failed_connecting(&self, _error: PhoneError) {}
    /// Teardown of the active connection was requested
    async fn on_disconnecting(&self) {}
    /// The active connection ended normally
    async fn on_disconnected(&self) {}
    /// The active connection ended abnormally after being established
    async fn on_failed(&self, _error: PhoneError) {}
    /// A pending incoming connection ended before accept/ignore resolved it
    async fn on_incoming_disconnected(&self) {}
}

/// Device lifecycle notifications
#[async_trait]
pub trait DeviceEventHandler: Send + Sync {
    /// The device is listening for incoming calls
    async fn on_started_listening(&self) {}
    /// The device stopped listening, with a reason when it was not orderly
    async fn on_stopped_listening(&self, _error: Option<String>) {}
}

/// Default handler; every notification is a no-op
struct NoOpHandler;

#[async_trait]
impl LoginEventHandler for NoOpHandler {}

#[async_trait]
impl ConnectionEventHandler for NoOpHandler {}

#[async_trait]
impl DeviceEventHandler for NoOpHandler {}

/// Holds the registered handler for each event channel
///
/// Channels default to no-op and can be replaced independently at any time.
pub struct EventDispatcher {
    login: RwLock<Arc<dyn LoginEventHandler>>,
    connection: RwLock<Arc<dyn ConnectionEventHandler>>,
    device: RwLock<Arc<dyn DeviceEventHandler>>,
}

impl EventDispatcher {
    /// Create a dispatcher with all channels set to no-op
    pub fn new() -> Self {
        Self::with_handlers(None, None, None)
    }

    /// Create a dispatcher with an initial handler per channel
    pub(crate) fn with_handlers(
        login: Option<Arc<dyn LoginEventHandler>>,
        connection: Option<Arc<dyn ConnectionEventHandler>>,
        device: Option<Arc<dyn DeviceEventHandler>>,
    ) -> Self {
        Self {
            login: RwLock::new(login.unwrap_or_else(|| Arc::new(NoOpHandler))),
            connection: RwLock::new(connection.unwrap_or_else(|| Arc::new(NoOpHandler))),
            device: RwLock::new(device.unwrap_or_else(|| Arc::new(NoOpHandler))),
        }
    }

    /// Register the login event handler
    pub async fn set_login_handler(&self, handler: Arc<dyn LoginEventHandler>) {
        *self.login.write().await = handler;
    }

    /// Register the connection event handler
    pub async fn set_connection_handler(&self, handler: Arc<dyn ConnectionEventHandler>) {
        *self.connection.write().await = handler;
    }

    /// Register the device event handler
    pub async fn set_device_handler(&self, handler: Arc<dyn DeviceEventHandler>) {
        *self.device.write().await = handler;
    }

    pub(crate) async fn login(&self) -> Arc<dyn LoginEventHandler> {
        self.login.read().await.clone()
    }

    pub(crate) async fn connection(&self) -> Arc<dyn ConnectionEventHandler> {
        self.connection.read().await.clone()
    }

    pub(crate) async fn device(&self) -> Arc<dyn DeviceEventHandler> {
        self.device.read().await.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
