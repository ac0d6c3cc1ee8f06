//! Shared mocks for the integration tests
//!
//! A minimal engine that always succeeds, a fetcher that answers with a
//! fixed token, and one recorder capturing callbacks and audio routing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use softphone_core::{
    AudioOutput, Capabilities, ConnectParams, ConnectionEventHandler, ConnectionId,
    CredentialFetcher, DeviceEventHandler, EngineConnection, EngineHandle, LoginEventHandler,
    LoginParams, PhoneError, PhoneResult, TelephonyEngine,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    /// Poll until the journal contains `entry`, panicking after a second
    pub async fn wait_for(&self, entry: &str) {
        for _ in 0..200 {
            if self.contains(entry) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {entry:?}; journal: {:?}", self.entries());
    }
}

pub struct Recorder(pub Arc<Journal>);

#[async_trait]
impl LoginEventHandler for Recorder {
    async fn on_login_started(&self) {
        self.0.push("login_started");
    }
    async fn on_login_finished(&self) {
        self.0.push("login_finished");
    }
    async fn on_login_error(&self, error: PhoneError) {
        self.0.push(format!("login_error:{error}"));
    }
}

#[async_trait]
impl ConnectionEventHandler for Recorder {
    async fn on_connecting(&self) {
        self.0.push("connecting");
    }
    async fn on_connected(&self) {
        self.0.push("connected");
    }
    async fn on_failed_connecting(&self, error: PhoneError) {
        self.0.push(format!("failed_connecting:{error}"));
    }
    async fn on_disconnecting(&self) {
        self.0.push("disconnecting");
    }
    async fn on_disconnected(&self) {
        self.0.push("disconnected");
    }
    async fn on_failed(&self, error: PhoneError) {
        self.0.push(format!("failed:{error}"));
    }
    async fn on_incoming_disconnected(&self) {
        self.0.push("incoming_disconnected");
    }
}

#[async_trait]
impl DeviceEventHandler for Recorder {}

#[async_trait]
impl AudioOutput for Recorder {
    async fn set_speaker_enabled(&self, enabled: bool) {
        self.0.push(format!("speaker:{enabled}"));
    }
}

pub struct SimpleConnection {
    id: ConnectionId,
    pub accepted: AtomicUsize,
    pub ignored: AtomicUsize,
    pub disconnect_requests: AtomicUsize,
}

impl SimpleConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            accepted: AtomicUsize::new(0),
            ignored: AtomicUsize::new(0),
            disconnect_requests: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EngineConnection for SimpleConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }
    async fn accept(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }
    async fn ignore(&self) {
        self.ignored.fetch_add(1, Ordering::SeqCst);
    }
    async fn disconnect(&self) {
        self.disconnect_requests.fetch_add(1, Ordering::SeqCst);
    }
    async fn set_muted(&self, _muted: bool) {}
}

pub struct SimpleHandle {
    capabilities: Capabilities,
    pub issued: Mutex<Vec<Arc<SimpleConnection>>>,
}

#[async_trait]
impl EngineHandle for SimpleHandle {
    async fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }
    async fn update_credential(&self, _token: &str) -> PhoneResult<()> {
        Ok(())
    }
    async fn release(&self) {}
    async fn connect(&self, _params: ConnectParams) -> Option<Arc<dyn EngineConnection>> {
        let connection = SimpleConnection::new();
        self.issued.lock().unwrap().push(connection.clone());
        Some(connection)
    }
}

/// Engine whose handles always come up with full capabilities
pub struct SimpleEngine {
    pub handles: Mutex<Vec<Arc<SimpleHandle>>>,
    expires_in: i64,
}

impl SimpleEngine {
    pub fn new(expires_in: i64) -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            expires_in,
        })
    }

    pub fn handle(&self) -> Arc<SimpleHandle> {
        self.handles
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no engine handle created")
    }

    pub fn last_issued(&self) -> Arc<SimpleConnection> {
        self.handle()
            .issued
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection issued")
    }
}

#[async_trait]
impl TelephonyEngine for SimpleEngine {
    async fn create_handle(&self, _token: &str) -> PhoneResult<Arc<dyn EngineHandle>> {
        let handle = Arc::new(SimpleHandle {
            capabilities: Capabilities {
                outgoing: true,
                incoming: true,
                expiration: Some(chrono::Utc::now().timestamp() + self.expires_in),
            },
            issued: Mutex::new(Vec::new()),
        });
        self.handles.lock().unwrap().push(handle.clone());
        Ok(handle)
    }
}

pub struct SimpleFetcher {
    token: String,
}

impl SimpleFetcher {
    pub fn new(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl CredentialFetcher for SimpleFetcher {
    async fn fetch(&self, _params: &LoginParams) -> PhoneResult<String> {
        Ok(self.token.clone())
    }
}
