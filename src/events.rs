//! Session Event Bus
//!
//! Typed pub/sub for authentication lifecycle signals. Components receive a
//! cloned [`EventBus`] at construction; publishing never fails, even when
//! nobody is listening.

use tokio::sync::broadcast;
use tracing::trace;

use crate::session::{Theme, User};

/// Capacity of the broadcast ring; slow subscribers lag instead of blocking
const BUS_CAPACITY: usize = 64;

/// Signals published by the core
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoginSuccess { user: User, token: String },
    Logout,
    AlreadyAuthenticated { user: User },
    ThemeChanged { theme: Theme },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::LoginSuccess { .. } => "login-success",
            SessionEvent::Logout => "logout",
            SessionEvent::AlreadyAuthenticated { .. } => "already-authenticated",
            SessionEvent::ThemeChanged { .. } => "theme-changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget publish
    pub fn publish(&self, event: SessionEvent) {
        trace!("event: {}", event.name());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
