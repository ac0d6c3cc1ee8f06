//! Credential lifecycle for the phone session
//!
//! A [`Credential`] is the time-limited opaque token that authorizes use of
//! the telephony engine. The [`CredentialStore`] tracks the current one and
//! decides when a refresh is required; the [`CredentialFetcher`] performs the
//! actual out-of-band request for a fresh token.
//!
//! The token text itself is opaque to this crate. Its expiration is not
//! parsed out of the token here - the engine decodes the token and advertises
//! the expiration through its capability set (see
//! [`Capabilities`](crate::engine::Capabilities)), which is where the store
//! learns it from.
//!
//! # Usage Examples
//!
//! ```rust
//! use softphone_core::credential::{Credential, CredentialStore};
//!
//! let mut store = CredentialStore::default();
//! assert!(!store.is_valid()); // no credential yet
//!
//! store.set(Credential::new("token-text", i64::MAX));
//! assert!(store.is_valid());
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{PhoneError, PhoneResult};

/// Parameters recorded by `login()` and encoded into the credential request
///
/// The same set is remembered as the "last used" parameters so that an
/// expired credential can be refreshed without the caller re-supplying them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginParams {
    /// Client identifier registered for incoming calls, if any
    pub client_name: Option<String>,
    /// Whether the credential should authorize outgoing calls
    pub allow_outgoing: bool,
    /// Whether the credential should authorize incoming calls
    pub allow_incoming: bool,
}

impl LoginParams {
    /// Create a new parameter set
    pub fn new(
        client_name: impl Into<Option<String>>,
        allow_outgoing: bool,
        allow_incoming: bool,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            allow_outgoing,
            allow_incoming,
        }
    }
}

/// A time-limited opaque token authorizing engine use
///
/// Immutable once issued; a refresh replaces it wholesale in the
/// [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque token text, as returned by the credential service
    pub token: String,
    /// Expiration as seconds since the Unix epoch, if the engine advertised one
    pub expires_at: Option<i64>,
}

impl Credential {
    /// Create a credential with a known expiration (seconds since epoch)
    pub fn new(token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Create a credential whose expiration is not (yet) known
    ///
    /// A credential without an expiration is treated as invalid, which makes
    /// the session refresh it before the next call attempt.
    pub fn without_expiration(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Whether the credential is still valid at `now` (seconds since epoch)
    ///
    /// Valid iff `expiration - now > 0`; a credential expiring exactly at
    /// `now` is already invalid.
    pub fn is_valid_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at - now > 0)
    }
}

/// Tracks the current credential and its expiration
///
/// An absent credential is simply invalid, not an error; the session reacts
/// to invalidity by triggering a refresh.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credential>,
}

impl CredentialStore {
    /// Replace the current credential wholesale
    pub fn set(&mut self, credential: Credential) {
        debug!(expires_at = ?credential.expires_at, "credential replaced");
        self.current = Some(credential);
    }

    /// The current credential, if one has been issued
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Whether a credential exists and its expiration exceeds the wall clock
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp())
    }

    /// Validity check against an explicit clock, for deterministic tests
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.current
            .as_ref()
            .map(|credential| credential.is_valid_at(now))
            .unwrap_or(false)
    }
}

/// Asynchronous out-of-band fetch of a fresh credential
///
/// Implementations perform a single attempt and never block the caller;
/// transport failures surface as [`PhoneError::CredentialFetch`] and are
/// reported as login errors, without retry.
///
/// The session guarantees that `fetch` is never outstanding twice at the
/// same time for one session.
#[async_trait]
pub trait CredentialFetcher: Send + Sync {
    /// Request a fresh credential for the given login parameters
    async fn fetch(&self, params: &LoginParams) -> PhoneResult<String>;
}

/// Build the credential request URL for a parameter set
///
/// The outgoing flag is always encoded; the client identifier is encoded
/// only when incoming calls are allowed and a client name is present.
pub fn credential_request_url(endpoint: &Url, params: &LoginParams) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("allowOutgoing", &params.allow_outgoing.to_string());
        if params.allow_incoming {
            if let Some(client_name) = &params.client_name {
                query.append_pair("client", client_name);
            }
        }
    }
    url
}

/// Credential fetcher backed by an HTTP credential service
///
/// Issues a single GET against the configured endpoint and returns the
/// response body as the credential text.
pub struct HttpCredentialFetcher {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpCredentialFetcher {
    /// Create a fetcher for the given credential service endpoint
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CredentialFetcher for HttpCredentialFetcher {
    async fn fetch(&self, params: &LoginParams) -> PhoneResult<String> {
        let url = credential_request_url(&self.endpoint, params);
        debug!(%url, "requesting credential");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PhoneError::credential_fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| PhoneError::credential_fetch(e.to_string()))?;

        let token = response
            .text()
            .await
            .map_err(|e| PhoneError::credential_fetch(e.to_string()))?;

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(PhoneError::credential_fetch(
                "credential service returned an empty body",
            ));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_invalid() {
        let store = CredentialStore::default();
        assert!(!store.is_valid_at(0));
    }

    #[test]
    fn credential_expiring_at_now_is_invalid() {
        let mut store = CredentialStore::default();
        store.set(Credential::new("token", 1_000));
        assert!(!store.is_valid_at(1_000));
        assert!(!store.is_valid_at(1_001));
    }

    #[test]
    fn credential_expiring_later_is_valid() {
        let mut store = CredentialStore::default();
        store.set(Credential::new("token", 1_000));
        assert!(store.is_valid_at(999));
    }

    #[test]
    fn credential_without_expiration_is_invalid() {
        let mut store = CredentialStore::default();
        store.set(Credential::without_expiration("token"));
        assert!(!store.is_valid_at(0));
    }

    #[test]
    fn replacement_is_wholesale() {
        let mut store = CredentialStore::default();
        store.set(Credential::new("old", 10));
        store.set(Credential::new("new", 2_000));
        assert_eq!(store.current().unwrap().token, "new");
        assert!(store.is_valid_at(1_000));
    }

    #[test]
    fn request_url_always_encodes_outgoing_flag() {
        let endpoint = Url::parse("https://example.com/token").unwrap();
        let params = LoginParams::new(None, false, false);
        let url = credential_request_url(&endpoint, &params);
        assert_eq!(url.query(), Some("allowOutgoing=false"));
    }

    #[test]
    fn request_url_includes_client_when_incoming_allowed() {
        let endpoint = Url::parse("https://example.com/token").unwrap();
        let params = LoginParams::new(Some("alice".to_string()), true, true);
        let url = credential_request_url(&endpoint, &params);
        assert_eq!(url.query(), Some("allowOutgoing=true&client=alice"));
    }

    #[test]
    fn request_url_omits_client_when_incoming_not_allowed() {
        let endpoint = Url::parse("https://example.com/token").unwrap();
        let params = LoginParams::new(Some("alice".to_string()), true, false);
        let url = credential_request_url(&endpoint, &params);
        assert_eq!(url.query(), Some("allowOutgoing=true"));
    }

    #[test]
    fn request_url_omits_client_when_name_missing() {
        let endpoint = Url::parse("https://example.com/token").unwrap();
        let params = LoginParams::new(None, true, true);
        let url = credential_request_url(&endpoint, &params);
        assert_eq!(url.query(), Some("allowOutgoing=true"));
    }
}
