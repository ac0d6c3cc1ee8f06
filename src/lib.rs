//! # Softphone Core - Voice Call Session Coordination
//!
//! This crate manages the lifecycle of a single voice-call "phone" session
//! on top of an external telephony engine:
//!
//! - **Credential lifecycle**: acquiring and renewing the time-limited
//!   access token that authorizes engine use
//! - **Engine bring-up**: the one-time `Uninitialized → Initializing → Ready`
//!   state machine, with deferred call requests while initializing
//! - **Call arbitration**: one active connection plus at most one pending
//!   incoming connection, driven by engine notifications
//! - **Audio routing**: a speaker preference re-applied whenever a call
//!   becomes active
//!
//! The engine itself (signaling, media transport), the credential-issuing
//! service, and the platform audio subsystem are external collaborators
//! consumed through the narrow traits in [`engine`], [`credential`], and
//! [`audio`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use softphone_core::{HttpCredentialFetcher, LoginParams, Phone};
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
//! // Fetch a credential and bring the engine up
//! phone.login(LoginParams::new(Some("alice".to_string()), true, true)).await;
//!
//! // Place a call once ready (requests made earlier are deferred and replayed)
//! phone.connect(None).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │     Host Application     │◄── events (login / connection / device)
//! └────────────┬─────────────┘
//!              │ login / connect / accept / ignore
//! ┌────────────▼─────────────┐
//! │          Phone           │
//! │  DeviceSession  bring-up │
//! │  CallController  slots   │
//! │  CredentialStore/Fetcher │
//! │  AudioRouter             │
//! └────────────┬─────────────┘
//!              │ narrow collaborator traits
//! ┌────────────▼─────────────┐
//! │ Telephony engine, token  │
//! │ service, platform audio  │
//! └──────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod audio;
pub mod connection;
pub mod credential;
pub mod engine;
pub mod error;
pub mod events;
pub mod phone;

// Re-export the main types
pub use audio::{AudioOutput, NullAudioOutput};
pub use connection::{ConnectParams, ConnectionDirection, ConnectionId, ConnectionState};
pub use credential::{Credential, CredentialFetcher, HttpCredentialFetcher, LoginParams};
pub use engine::{
    Capabilities, EngineConnection, EngineEvent, EngineHandle, IncomingCallEvent, TelephonyEngine,
};
pub use error::{PhoneError, PhoneResult};
pub use events::{ConnectionEventHandler, DeviceEventHandler, LoginEventHandler};
pub use phone::{EngineState, Phone, PhoneBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
