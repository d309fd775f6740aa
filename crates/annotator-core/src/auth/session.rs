//! The session store: the single source of truth for who is logged in.
//!
//! State is mirrored into a durable [`KeyValueStore`] under two keys, `token`
//! and `user`, which are always written and removed together. Expiry is
//! checked lazily (on guard evaluation and request preparation), never on a
//! timer. No public operation returns an error: every failure path ends in the
//! cleared state, which callers observe through [`SessionStore::is_authenticated`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use super::cookies::{CookieAttributes, KeyValueStore};
use super::profile::LoginPayload;
use super::token::is_token_expired;
use crate::clock::Clock;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Entry point every invalid session is sent to
pub const LOGIN_PATH: &str = "/login";

/// Where the user is sent when the session ends.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
    }
}

/// Tells the backend a session is ending. Advisory only.
pub trait LogoutNotifier {
    fn notify_logout(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<LoginPayload>,
    pub token: Option<String>,
    pub is_authenticated: bool,
}

struct Inner {
    state: SessionState,
    storage: Box<dyn KeyValueStore>,
}

impl Inner {
    fn clear(&mut self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session key");
            }
        }
        self.state = SessionState::default();
    }

    fn persist(&mut self, payload: &LoginPayload) -> anyhow::Result<()> {
        let attributes = CookieAttributes::session();
        let user = serde_json::to_string(payload)?;
        self.storage.set(TOKEN_KEY, &payload.token, &attributes)?;
        self.storage.set(USER_KEY, &user, &attributes)?;
        Ok(())
    }

    fn read_persisted(&self) -> (Option<String>, Option<String>) {
        let read = |key| match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted session key");
                None
            }
        };
        (read(TOKEN_KEY), read(USER_KEY))
    }
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
}

impl SessionStore {
    /// Create an unauthenticated store. Call [`initialize`](Self::initialize)
    /// to restore a persisted session.
    pub fn new(
        storage: Box<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::default(),
                storage,
            }),
            clock,
            navigator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, token: &str) -> bool {
        is_token_expired(token, self.clock.as_ref())
    }

    /// Store a fresh login. An empty, malformed or expired token clears the
    /// session instead; check [`is_authenticated`](Self::is_authenticated) afterwards.
    pub fn set_session(&self, payload: LoginPayload) {
        let mut inner = self.lock();
        if payload.token.is_empty() || self.is_expired(&payload.token) {
            info!(username = %payload.username, "Rejecting login with invalid or expired token");
            inner.clear();
            return;
        }

        if let Err(e) = inner.persist(&payload) {
            error!(error = %e, "Failed to persist session");
            inner.clear();
            return;
        }

        debug!(username = %payload.username, "Session established");
        inner.state = SessionState {
            token: Some(payload.token.clone()),
            user: Some(payload),
            is_authenticated: true,
        };
    }

    /// Remove both persisted keys and reset the in-memory state
    pub fn clear_session(&self) {
        self.lock().clear();
        debug!("Session cleared");
    }

    /// Notify the backend, then clear locally and redirect to the login page.
    ///
    /// The local clear and the redirect happen even if the notification
    /// fails, panics or the returned future is dropped before completion.
    pub async fn logout<N: LogoutNotifier>(&self, notifier: &N) {
        let _finish = FinishLogout(self);
        if let Err(e) = notifier.notify_logout().await {
            error!(error = %e, "Logout notification failed");
        }
    }

    /// Restore the session from the durable store. Safe to call repeatedly.
    pub fn initialize(&self) {
        let mut inner = self.lock();
        self.restore(&mut inner);
    }

    fn restore(&self, inner: &mut Inner) {
        match inner.read_persisted() {
            (None, None) => {
                inner.state = SessionState::default();
            }
            (Some(token), Some(user)) => {
                if self.is_expired(&token) {
                    info!("Persisted session has expired");
                    inner.clear();
                    return;
                }
                match serde_json::from_str::<LoginPayload>(&user) {
                    Ok(user) => {
                        debug!(username = %user.username, "Session restored");
                        inner.state = SessionState {
                            user: Some(user),
                            token: Some(token),
                            is_authenticated: true,
                        };
                    }
                    Err(e) => {
                        warn!(error = %e, "Persisted user is unreadable");
                        inner.clear();
                    }
                }
            }
            _ => {
                warn!("Persisted session is incomplete");
                inner.clear();
            }
        }
    }

    /// Re-check an authenticated session against the clock and the durable
    /// store, clearing it if the token has lapsed or the persisted keys are
    /// gone. A session replaced in the store by another process is adopted.
    /// Returns whether the session is still authenticated.
    pub fn check_expiry(&self) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_authenticated {
            return false;
        }

        match inner.read_persisted().0 {
            None => {
                info!("Persisted session is gone");
                inner.clear();
            }
            Some(token) if inner.state.token.as_deref() == Some(token.as_str()) => {
                if self.is_expired(&token) {
                    info!("Session token expired");
                    inner.clear();
                }
            }
            Some(_) => {
                debug!("Persisted session was replaced");
                self.restore(&mut inner);
            }
        }
        inner.state.is_authenticated
    }

    /// Token to attach to an outgoing request.
    ///
    /// Reads the persisted token. An expired one, or a missing one while this
    /// store still believes it is logged in, ends the session and sends the
    /// user to the login page.
    pub fn bearer_token(&self) -> Option<String> {
        {
            let mut inner = self.lock();
            match inner.read_persisted().0 {
                Some(token) if !self.is_expired(&token) => return Some(token),
                Some(_) => {
                    info!("Persisted token expired before request");
                    inner.clear();
                }
                None if inner.state.is_authenticated => {
                    info!("Persisted session is gone");
                    inner.clear();
                }
                None => return None,
            }
        }
        self.navigator.redirect(LOGIN_PATH);
        None
    }

    /// The backend rejected our credentials
    pub fn handle_unauthorized(&self) {
        warn!("Backend rejected session credentials");
        self.clear_session();
        self.navigator.redirect(LOGIN_PATH);
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().state.is_authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.lock().state.token.clone()
    }

    pub fn user(&self) -> Option<LoginPayload> {
        self.lock().state.user.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }
}

/// Runs the local half of logout when dropped.
struct FinishLogout<'a>(&'a SessionStore);

impl Drop for FinishLogout<'_> {
    fn drop(&mut self) {
        self.0.clear_session();
        self.0.navigator.redirect(LOGIN_PATH);
        info!("Logged out");
    }
}
