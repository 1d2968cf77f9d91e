//! Session Store
//!
//! Holds the current authentication state. Every mutation replaces the
//! whole session under a single write lock, so readers never observe a
//! half-written session.
//!
//! A session is *authenticated* iff both token and user are present, and
//! *expired* iff authenticated and older than the configured window. The
//! window is a wall-clock heuristic from the last login, not a token claim.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Prefix tagging tokens synthesized by the local credential table
pub const LOCAL_TOKEN_PREFIX: &str = "local-";

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Supervisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Operator,
    Supervisor,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Operator => "operator",
            Theme::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "operator" => Ok(Theme::Operator),
            "supervisor" => Ok(Theme::Supervisor),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl User {
    /// Supervisors implicitly hold every permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::Supervisor || self.permissions.contains(permission)
    }

    pub fn is_supervisor(&self) -> bool {
        self.role == Role::Supervisor
    }
}

/// Where the current token came from, recorded when the session is
/// established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Remote,
    Local,
}

impl TokenOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenOrigin::Remote => "remote",
            TokenOrigin::Local => "local",
        }
    }
}

impl fmt::Display for TokenOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(TokenOrigin::Remote),
            "local" => Ok(TokenOrigin::Local),
            other => Err(format!("unknown token origin '{}'", other)),
        }
    }
}

/// Backend connectivity as last observed by the authenticator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connected,
}

/// Session snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    pub last_login: Option<DateTime<Utc>>,
    pub origin: Option<TokenOrigin>,
    pub theme: Theme,
    pub connectivity: Connectivity,
}

impl Session {
    /// Token and user both present
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Missing last-login timestamp counts as expired
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.last_login {
            Some(at) => now - at > ttl,
            None => true,
        }
    }

    /// Authenticated and inside the expiry window
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_authenticated() && !self.is_expired_at(now, ttl)
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn token_origin(&self) -> Option<TokenOrigin> {
        self.origin.filter(|_| self.token.is_some())
    }
}

/// Shared session state
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.inner.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.read().user.clone()
    }

    pub fn theme(&self) -> Theme {
        self.inner.read().theme
    }

    /// Install a freshly authenticated session, keeping the theme
    pub fn establish(
        &self,
        token: String,
        origin: TokenOrigin,
        user: User,
        at: DateTime<Utc>,
        connectivity: Connectivity,
    ) {
        let mut session = self.inner.write();
        session.token = Some(token);
        session.origin = Some(origin);
        session.user = Some(user);
        session.last_login = Some(at);
        session.connectivity = connectivity;
    }

    /// Reinstate a persisted session; connectivity is unknown until reconciled
    pub fn restore(
        &self,
        token: String,
        origin: Option<TokenOrigin>,
        user: User,
        last_login: Option<DateTime<Utc>>,
    ) {
        let mut session = self.inner.write();
        session.token = Some(token);
        session.origin = origin;
        session.user = Some(user);
        session.last_login = last_login;
        session.connectivity = Connectivity::Disconnected;
    }

    /// Drop credentials, keeping the theme. Idempotent.
    pub fn clear(&self) {
        let mut session = self.inner.write();
        let theme = session.theme;
        *session = Session {
            theme,
            ..Session::default()
        };
    }

    /// Clear the session if it is authenticated but expired.
    /// Returns true when an expiry was applied.
    pub fn expire_if_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let mut session = self.inner.write();
        if session.is_authenticated() && session.is_expired_at(now, ttl) {
            let theme = session.theme;
            *session = Session {
                theme,
                ..Session::default()
            };
            true
        } else {
            false
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        self.inner.write().theme = theme;
    }

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        self.inner.write().connectivity = connectivity;
    }
}
