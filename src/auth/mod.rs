//! Authenticator
//!
//! Validates credentials and owns the session lifecycle.
//!
//! # Login order
//!
//! 1. Remote service, bounded by [`AuthConfig::timeout`]
//! 2. Local credential table (when enabled) on *any* remote failure,
//!    including an explicit rejection
//! 3. Otherwise [`AuthError::InvalidCredentials`]
//!
//! At most one login may be in flight; a concurrent attempt is rejected
//! with [`AuthError::LoginInProgress`].
//!
//! Expiry is a 24h wall-clock heuristic from the last login, not a check of
//! the token's own claims.

pub mod backend;
pub mod fallback;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventBus, SessionEvent};
use crate::session::{Connectivity, SessionStore, TokenOrigin, User};
use crate::storage::{KeyValueStore, StorageError, LAST_LOGIN_KEY, ORIGIN_KEY, TOKEN_KEY, USER_KEY};

pub use backend::{AuthBackend, BackendError, HttpAuthBackend, LoginRequest, OfflineBackend, RemoteLogin, RemoteUser};

/// Authentication errors surfaced to the caller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("invalid credentials or backend unavailable")]
    InvalidCredentials,

    #[error("a login attempt is already in progress")]
    LoginInProgress,

    #[error("console is not accepting logins")]
    Unavailable,

    #[error("login cancelled by logout")]
    Cancelled,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Full URL of the remote login endpoint
    pub login_url: String,
    /// Bound on the remote call
    pub timeout: Duration,
    /// Session lifetime from last login
    pub session_ttl: chrono::Duration,
    /// Sent as `device` in the login request
    pub device_id: String,
    /// Fall back to the local credential table
    pub allow_local_fallback: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: "http://localhost:3000/api/auth/login".to_string(),
            timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::hours(24),
            device_id: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            allow_local_fallback: true,
        }
    }
}

/// Result of startup reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Authenticated(User),
    Expired,
    LoginRequired,
}

/// Session as read back from storage
struct PersistedSession {
    token: String,
    origin: Option<TokenOrigin>,
    user: User,
    last_login: Option<DateTime<Utc>>,
}

/// Clears the in-flight flag when the login attempt ends
struct LoginGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoginGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Authenticator {
    config: AuthConfig,
    backend: Arc<dyn AuthBackend>,
    session: Arc<SessionStore>,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    login_in_flight: AtomicBool,
}

impl Authenticator {
    pub fn new(
        config: AuthConfig,
        backend: Arc<dyn AuthBackend>,
        session: Arc<SessionStore>,
        storage: Arc<dyn KeyValueStore>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            backend,
            session,
            storage,
            bus,
            login_in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn is_login_in_flight(&self) -> bool {
        self.login_in_flight.load(Ordering::Acquire)
    }

    /// Authenticate, remote first then the local table
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let _guard = LoginGuard::acquire(&self.login_in_flight).ok_or_else(|| {
            debug!("Ignoring login for '{}': attempt already in flight", username);
            AuthError::LoginInProgress
        })?;

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            device: self.config.device_id.clone(),
        };

        let remote = match tokio::time::timeout(self.config.timeout, self.backend.login(&request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.config.timeout)),
        };

        match remote {
            Ok(login) => {
                let user = login.user.into_user(username);
                info!("Remote login succeeded for '{}' ({})", user.username, user.role);
                self.establish(login.token, TokenOrigin::Remote, user.clone());
                return Ok(user);
            }
            Err(e) => warn!("Remote login unavailable for '{}': {}", username, e),
        }

        if self.config.allow_local_fallback {
            if let Some(user) = fallback::verify(username, password) {
                info!("Local fallback login for '{}' ({})", user.username, user.role);
                self.establish(fallback::issue_token(), TokenOrigin::Local, user.clone());
                return Ok(user);
            }
        }

        info!("Login failed for '{}'", username);
        Err(AuthError::InvalidCredentials)
    }

    /// Install, persist and announce a new session
    fn establish(&self, token: String, origin: TokenOrigin, user: User) {
        let now = Utc::now();
        self.session
            .establish(token.clone(), origin, user.clone(), now, Connectivity::Connected);

        if let Err(e) = self.persist(&token, origin, &user, now) {
            warn!("Session not persisted: {}", e);
        }

        debug!("Session established ({} token)", origin);
        self.bus.publish(SessionEvent::LoginSuccess { user, token });
    }

    fn persist(&self, token: &str, origin: TokenOrigin, user: &User, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(ORIGIN_KEY, origin.as_str())?;
        self.storage.set(USER_KEY, &serde_json::to_string(user)?)?;
        self.storage.set(LAST_LOGIN_KEY, &at.to_rfc3339())?;
        Ok(())
    }

    /// Clear the session and persisted credentials. Safe when logged out;
    /// the logout event is only published when a session was dropped.
    pub fn logout(&self) {
        let was_authenticated = self.session.is_authenticated();
        self.session.clear();
        self.forget_persisted();

        if was_authenticated {
            info!("Logged out");
            self.bus.publish(SessionEvent::Logout);
        }
    }

    fn forget_persisted(&self) {
        if let Err(e) = self.storage.remove_all(&[TOKEN_KEY, ORIGIN_KEY, USER_KEY, LAST_LOGIN_KEY]) {
            warn!("Failed to clear persisted session: {}", e);
        }
    }

    /// Token and user both present
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Missing last-login timestamp counts as expired
    pub fn is_token_expired(&self) -> bool {
        self.session
            .snapshot()
            .is_expired_at(Utc::now(), self.config.session_ttl)
    }

    /// Authenticated and not expired
    pub fn has_valid_session(&self) -> bool {
        self.session
            .snapshot()
            .is_valid_at(Utc::now(), self.config.session_ttl)
    }

    /// Drop the session if it has outlived the expiry window.
    /// Returns true when an expiry was applied.
    pub fn expire_if_stale(&self) -> bool {
        if !self.session.expire_if_stale(Utc::now(), self.config.session_ttl) {
            return false;
        }
        info!("Session expired");
        self.forget_persisted();
        self.bus.publish(SessionEvent::Logout);
        true
    }

    /// Load the persisted session, if any. Corrupt entries are discarded
    /// and treated as absence.
    pub fn restore(&self) -> bool {
        match self.read_persisted() {
            Ok(Some(persisted)) => {
                debug!("Restored session for '{}'", persisted.user.username);
                self.session
                    .restore(persisted.token, persisted.origin, persisted.user, persisted.last_login);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Discarding persisted session: {}", e);
                self.forget_persisted();
                self.session.clear();
                false
            }
        }
    }

    fn read_persisted(&self) -> Result<Option<PersistedSession>, StorageError> {
        let token = self.storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let raw_user = self.storage.get(USER_KEY)?;
        let (Some(token), Some(raw_user)) = (token, raw_user) else {
            return Ok(None);
        };

        let user: User = serde_json::from_str(&raw_user).map_err(|e| StorageError::Corrupt {
            key: USER_KEY.to_string(),
            reason: e.to_string(),
        })?;

        let last_login = match self.storage.get(LAST_LOGIN_KEY)? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| StorageError::Corrupt {
                        key: LAST_LOGIN_KEY.to_string(),
                        reason: e.to_string(),
                    })?,
            ),
            None => None,
        };

        // unknown origin is not worth discarding the session for
        let origin = self.storage.get(ORIGIN_KEY)?.and_then(|raw| raw.parse().ok());

        Ok(Some(PersistedSession {
            token,
            origin,
            user,
            last_login,
        }))
    }

    /// Startup reconciliation, no network round-trip
    pub fn check_current_auth(&self) -> AuthStatus {
        if !self.session.is_authenticated() {
            return AuthStatus::LoginRequired;
        }

        if self.is_token_expired() {
            info!("Persisted session expired, logging out");
            self.logout();
            return AuthStatus::Expired;
        }

        match self.session.user() {
            Some(user) => {
                self.session.set_connectivity(Connectivity::Connected);
                self.bus.publish(SessionEvent::AlreadyAuthenticated { user: user.clone() });
                AuthStatus::Authenticated(user)
            }
            None => AuthStatus::LoginRequired,
        }
    }
}
