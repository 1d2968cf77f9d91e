//! Role-gated Navigation
//!
//! Views are declared once at startup. [`NavigationGuard::resolve`] decides
//! whether a requested view may become active for the current session:
//!
//! 1. anything but `login` without a valid session → `login`
//! 2. unknown view → `dashboard`
//! 3. supervisor-only view for a non-supervisor → `dashboard`
//! 4. already-active view → [`Decision::Unchanged`] (skip the transition)
//! 5. otherwise → [`Decision::Allow`]
//!
//! `login` is public: an authenticated session may still open it.
//!
//! An expired session counts as unauthenticated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Role, Session};

pub const LOGIN_VIEW: &str = "login";
pub const DEFAULT_VIEW: &str = "dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    Public,
    Authenticated,
    SupervisorOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub id: String,
    pub policy: AccessPolicy,
}

impl ViewDescriptor {
    pub fn new(id: impl Into<String>, policy: AccessPolicy) -> Self {
        Self {
            id: id.into(),
            policy,
        }
    }

    pub fn public(id: impl Into<String>) -> Self {
        Self::new(id, AccessPolicy::Public)
    }

    pub fn authenticated(id: impl Into<String>) -> Self {
        Self::new(id, AccessPolicy::Authenticated)
    }

    pub fn supervisor_only(id: impl Into<String>) -> Self {
        Self::new(id, AccessPolicy::SupervisorOnly)
    }
}

/// Declared views, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ViewTable {
    views: Vec<ViewDescriptor>,
}

impl ViewTable {
    /// Later duplicates of an id are ignored
    pub fn new(views: impl IntoIterator<Item = ViewDescriptor>) -> Self {
        let mut table = Self::default();
        for view in views {
            if table.get(&view.id).is_none() {
                table.views.push(view);
            }
        }
        table
    }

    /// The console's stock views
    pub fn standard() -> Self {
        Self::new([
            ViewDescriptor::public(LOGIN_VIEW),
            ViewDescriptor::authenticated(DEFAULT_VIEW),
            ViewDescriptor::authenticated("alerts"),
            ViewDescriptor::authenticated("reports"),
            ViewDescriptor::supervisor_only("config"),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&ViewDescriptor> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewDescriptor> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Guard outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Activate this view
    Allow(ViewDescriptor),
    /// Requested view is already active; do nothing
    Unchanged(String),
    /// Navigate to another view instead
    RedirectTo(String),
}

impl Decision {
    pub fn is_noop(&self) -> bool {
        matches!(self, Decision::Unchanged(_))
    }
}

pub struct NavigationGuard {
    views: ViewTable,
    session_ttl: chrono::Duration,
}

impl NavigationGuard {
    pub fn new(views: ViewTable, session_ttl: chrono::Duration) -> Self {
        Self { views, session_ttl }
    }

    pub fn views(&self) -> &ViewTable {
        &self.views
    }

    pub fn resolve(&self, requested: &str, session: &Session, active: Option<&str>) -> Decision {
        self.resolve_at(requested, session, active, Utc::now())
    }

    pub fn resolve_at(
        &self,
        requested: &str,
        session: &Session,
        active: Option<&str>,
        now: DateTime<Utc>,
    ) -> Decision {
        let authenticated = session.is_valid_at(now, self.session_ttl);

        if requested != LOGIN_VIEW && !authenticated {
            return Decision::RedirectTo(LOGIN_VIEW.to_string());
        }

        let Some(view) = self.views.get(requested) else {
            return Decision::RedirectTo(DEFAULT_VIEW.to_string());
        };

        if view.policy == AccessPolicy::SupervisorOnly && session.role() != Some(Role::Supervisor) {
            return Decision::RedirectTo(DEFAULT_VIEW.to_string());
        }

        if active == Some(requested) {
            return Decision::Unchanged(view.id.clone());
        }

        Decision::Allow(view.clone())
    }
}

/// Extract a view id from a location fragment (`#reports`, `#/reports?x=1`)
pub fn parse_fragment(fragment: &str) -> Option<String> {
    let id = fragment
        .trim()
        .trim_start_matches('#')
        .trim_start_matches('/')
        .split(['?', '/'])
        .next()
        .unwrap_or_default()
        .trim();

    (!id.is_empty()).then(|| id.to_string())
}

/// View to resolve at startup: the fragment (or `dashboard`) when
/// authenticated, always `login` otherwise
pub fn initial_target(fragment: Option<&str>, authenticated: bool) -> String {
    if !authenticated {
        return LOGIN_VIEW.to_string();
    }
    fragment
        .and_then(parse_fragment)
        .unwrap_or_else(|| DEFAULT_VIEW.to_string())
}

/// Rendering collaborator for the single active-view toggle
pub trait ViewShell: Send + Sync {
    fn activate(&self, view: &ViewDescriptor);
    fn deactivate(&self, view_id: &str);

    /// Navigation highlight for the active entry
    fn highlight(&self, _view_id: &str) {}

    /// Reflect a redirect back into the location fragment
    fn replace_location(&self, _view_id: &str) {}
}

/// Shell that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullShell;

impl ViewShell for NullShell {
    fn activate(&self, _view: &ViewDescriptor) {}
    fn deactivate(&self, _view_id: &str) {}
}
