//! Engine bring-up and credential refresh
//!
//! `login()` drives the one-time bring-up of the telephony engine through an
//! explicit state machine, `Uninitialized → Initializing → Ready`, and the
//! credential refresh path once the engine is up. Bring-up failure resets to
//! `Uninitialized`; nothing is ever left half initialized.
//!
//! Credential fetches complete on background tasks. Each `login()` bumps a
//! generation counter and a completion whose generation is stale is
//! discarded: the fetch is re-issued with the latest recorded parameters
//! instead of applying an outdated credential. Together with the
//! fetch-in-flight flag this keeps at most one fetch outstanding per session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::{Credential, CredentialStore, LoginParams};
use crate::engine::{Capabilities, EngineHandle};
use crate::error::{PhoneError, PhoneResult};

use super::Phone;

/// Bring-up state of the underlying telephony engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Bring-up has not started, or the last attempt failed
    Uninitialized,
    /// Bring-up is running; connects are deferred, further logins are no-ops
    Initializing,
    /// The engine handle exists and can issue connections
    Ready,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "Uninitialized"),
            EngineState::Initializing => write!(f, "Initializing"),
            EngineState::Ready => write!(f, "Ready"),
        }
    }
}

/// Owns the engine handle and everything needed to (re)acquire it
pub(crate) struct DeviceSession {
    pub(crate) engine_state: EngineState,
    /// Last-used login parameters, replayed for credential refreshes
    pub(crate) params: Option<LoginParams>,
    pub(crate) handle: Option<Arc<dyn EngineHandle>>,
    /// Capability set cached from the handle at the last credential change
    pub(crate) capabilities: Capabilities,
    pub(crate) credentials: CredentialStore,
    /// A connect was requested before the engine was ready; replayed once
    pub(crate) deferred_connect: bool,
    /// Bumped on every login; stale fetch completions are discarded
    pub(crate) fetch_generation: u64,
    pub(crate) fetch_in_flight: bool,
}

impl DeviceSession {
    pub(crate) fn new() -> Self {
        Self {
            engine_state: EngineState::Uninitialized,
            params: None,
            handle: None,
            capabilities: Capabilities::default(),
            credentials: CredentialStore::default(),
            deferred_connect: false,
            fetch_generation: 0,
            fetch_in_flight: false,
        }
    }

    /// Drop the handle and return to `Uninitialized`
    fn reset_engine(&mut self) {
        self.engine_state = EngineState::Uninitialized;
        self.handle = None;
        self.capabilities = Capabilities::default();
    }
}

impl Phone {
    /// Log in: record the parameters and bring the engine up or refresh it
    ///
    /// Notifies `on_login_started` immediately and later exactly one of
    /// `on_login_finished` or `on_login_error`. While bring-up is already
    /// running this only records the parameters; the running bring-up picks
    /// them up through the generation counter.
    pub async fn login(&self, params: LoginParams) {
        info!(client = ?params.client_name, outgoing = params.allow_outgoing,
              incoming = params.allow_incoming, "login requested");
        self.events.login().await.on_login_started().await;

        let fetch = {
            let mut state = self.state.lock().await;
            let session = &mut state.session;
            session.params = Some(params.clone());
            session.fetch_generation += 1;
            let generation = session.fetch_generation;

            match session.engine_state {
                EngineState::Uninitialized => {
                    session.engine_state = EngineState::Initializing;
                    session.fetch_in_flight = true;
                    Some(generation)
                }
                EngineState::Initializing => {
                    debug!("bring-up already in progress; parameters recorded");
                    None
                }
                EngineState::Ready => {
                    if session.fetch_in_flight {
                        debug!("credential fetch already outstanding; latest parameters win");
                        None
                    } else {
                        session.fetch_in_flight = true;
                        Some(generation)
                    }
                }
            }
        };

        if let Some(generation) = fetch {
            self.spawn_credential_fetch(generation, params);
        }
    }

    /// Run the credential fetch off the calling task
    fn spawn_credential_fetch(&self, generation: u64, params: LoginParams) {
        let Some(phone) = self.me.upgrade() else {
            return; // session dropped
        };
        tokio::spawn(async move {
            let result = phone.fetcher.fetch(&params).await;
            phone.finish_credential_fetch(generation, result).await;
        });
    }

    /// Apply a credential fetch completion
    ///
    /// `fetch_in_flight` stays set until the completion commits or fails, so
    /// at most one completion path runs at a time. A login that arrives
    /// meanwhile only records its parameters and bumps the generation; the
    /// running completion notices the bump and re-issues the fetch instead
    /// of applying an outdated token.
    async fn finish_credential_fetch(&self, generation: u64, result: PhoneResult<String>) {
        match result {
            Ok(token) => self.complete_login(generation, &token).await,
            Err(error) => {
                warn!(%error, "credential fetch failed");
                let superseded = {
                    let mut state = self.state.lock().await;
                    let session = &mut state.session;
                    if generation != session.fetch_generation {
                        true
                    } else {
                        session.fetch_in_flight = false;
                        if session.engine_state == EngineState::Initializing {
                            session.reset_engine();
                        }
                        false
                    }
                };
                if superseded {
                    self.refetch_superseded().await;
                } else {
                    self.events.login().await.on_login_error(error).await;
                }
            }
        }
    }

    /// Create or update the engine handle with a fresh token
    ///
    /// The generation is re-checked under the lock before the token touches
    /// the engine and again before it is committed; whenever a newer login
    /// has superseded it, the token is dropped and the fetch re-issued with
    /// the newer parameters. On a committed success the session becomes
    /// `Ready`, the credential store is updated from the handle's advertised
    /// expiration, `on_login_finished` fires, and a deferred connect (if
    /// any) is replayed.
    async fn complete_login(&self, generation: u64, token: &str) {
        let entry = {
            let state = self.state.lock().await;
            if generation == state.session.fetch_generation {
                Some(state.session.handle.clone())
            } else {
                None
            }
        };
        let Some(existing) = entry else {
            self.refetch_superseded().await;
            return;
        };

        let handle = match existing {
            None => match self.engine.create_handle(token).await {
                Ok(handle) => handle,
                Err(error) => {
                    warn!(%error, "engine bring-up failed");
                    self.fail_login(generation, error).await;
                    return;
                }
            },
            Some(handle) => match handle.update_credential(token).await {
                Ok(()) => handle,
                Err(error) => {
                    warn!(%error, "credential update failed; releasing engine handle");
                    handle.release().await;
                    self.fail_login(generation, error).await;
                    return;
                }
            },
        };

        let capabilities = handle.capabilities().await;
        let committed = {
            let mut state = self.state.lock().await;
            let session = &mut state.session;
            if generation == session.fetch_generation {
                session.credentials.set(Credential {
                    token: token.to_string(),
                    expires_at: capabilities.expiration,
                });
                session.capabilities = capabilities;
                session.handle = Some(handle);
                session.engine_state = EngineState::Ready;
                session.fetch_in_flight = false;
                Some(std::mem::take(&mut session.deferred_connect))
            } else {
                // Superseded while the token was being applied. Keep the
                // handle so the refetch updates it in place, but not the
                // outdated credential; the superseding completion notifies
                // and replays the deferred connect.
                session.capabilities = capabilities;
                session.handle = Some(handle);
                session.engine_state = EngineState::Ready;
                None
            }
        };

        match committed {
            Some(deferred) => {
                info!("engine ready");
                self.events.login().await.on_login_finished().await;
                if deferred {
                    debug!("replaying deferred connect");
                    self.connect(None).await;
                }
            }
            None => self.refetch_superseded().await,
        }
    }

    /// Re-issue the fetch with the parameters the superseding login recorded
    async fn refetch_superseded(&self) {
        let refetch = {
            let mut state = self.state.lock().await;
            let session = &mut state.session;
            match session.params.clone() {
                Some(params) => Some((session.fetch_generation, params)),
                None => {
                    session.fetch_in_flight = false;
                    None
                }
            }
        };
        if let Some((generation, params)) = refetch {
            debug!("discarding superseded credential; refetching with latest parameters");
            self.spawn_credential_fetch(generation, params);
        }
    }

    /// Reset after a failed apply, or hand over to a superseding login
    async fn fail_login(&self, generation: u64, error: PhoneError) {
        let superseded = {
            let mut state = self.state.lock().await;
            let session = &mut state.session;
            session.reset_engine();
            if generation != session.fetch_generation {
                session.engine_state = EngineState::Initializing;
                true
            } else {
                session.fetch_in_flight = false;
                false
            }
        };
        if superseded {
            self.refetch_superseded().await;
        } else {
            self.events.login().await.on_login_error(error).await;
        }
    }
}
