//! Error types for the softphone core library

use thiserror::Error;

/// Result type for phone operations
pub type PhoneResult<T> = Result<T, PhoneError>;

/// Errors surfaced by the phone session layer
///
/// Every error is reported exactly once, at the point of detection, through
/// the matching [`crate::events`] callback. None of them are retried
/// automatically, and each leaves the session, engine handle, or connection
/// slot in a well-defined reset or terminal state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// Fetching a fresh credential from the credential service failed
    ///
    /// Surfaced as a login error. The session keeps its previous credential
    /// (if any) and the engine state is reset if bring-up was in progress.
    #[error("Credential fetch failed: {message}")]
    CredentialFetch { message: String },

    /// Engine bring-up or credential update failed
    ///
    /// Any partially created engine handle is released and the session
    /// returns to the uninitialized state. Surfaced as a login error.
    #[error("Engine initialization failed: {message}")]
    EngineInit { message: String },

    /// The engine refused to create an outgoing connection
    ///
    /// Surfaced as a failed-connecting event. The active connection slot is
    /// left untouched.
    #[error("Could not create connection: {message}")]
    ConnectionCreate { message: String },

    /// An established or in-progress connection terminated abnormally
    ///
    /// The owning slot is cleared and the error is surfaced as either
    /// connection-failed or failed-connecting depending on how far the
    /// connection had progressed.
    #[error("Connection error {code}: {message}")]
    ConnectionRuntime { code: i32, message: String },

    /// The operation is not valid in the current session state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl PhoneError {
    /// Create a credential fetch error
    pub fn credential_fetch(message: impl Into<String>) -> Self {
        Self::CredentialFetch {
            message: message.into(),
        }
    }

    /// Create an engine initialization error
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::EngineInit {
            message: message.into(),
        }
    }

    /// Create a connection creation error
    pub fn connection_create(message: impl Into<String>) -> Self {
        Self::ConnectionCreate {
            message: message.into(),
        }
    }

    /// Create a connection runtime error
    pub fn connection_runtime(code: i32, message: impl Into<String>) -> Self {
        Self::ConnectionRuntime {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
