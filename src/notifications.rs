//! User Feedback Notifications
//!
//! Fire-and-forget toasts. `notify` never blocks and never fails; every
//! notification expires after the configured TTL unless dismissed first.
//! A rendering shell follows [`Notifier::subscribe`] for show/dismiss events.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const FEED_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed(Uuid),
}

struct Entry {
    notification: Notification,
    expires_at: Instant,
}

struct Inner {
    ttl: Duration,
    entries: Mutex<Vec<Entry>>,
    tx: broadcast::Sender<NotificationEvent>,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                ttl,
                entries: Mutex::new(Vec::new()),
                tx,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Show a notification; schedules its expiry when a runtime is present
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            created_at: Utc::now(),
        };
        let id = notification.id;

        match severity {
            Severity::Error => error!("[notify] {}", notification.message),
            Severity::Warning => warn!("[notify] {}", notification.message),
            Severity::Info | Severity::Success => info!("[notify] {}", notification.message),
        }

        self.inner.entries.lock().push(Entry {
            notification: notification.clone(),
            expires_at: Instant::now() + self.inner.ttl,
        });
        let _ = self.inner.tx.send(NotificationEvent::Shown(notification));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let notifier = self.clone();
            let ttl = self.inner.ttl;
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                notifier.dismiss(id);
            });
        }

        id
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Error)
    }

    /// Remove a notification. Returns false if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let removed = {
            let mut entries = self.inner.entries.lock();
            let before = entries.len();
            entries.retain(|e| e.notification.id != id);
            entries.len() != before
        };

        if removed {
            debug!("Notification {} dismissed", id);
            let _ = self.inner.tx.send(NotificationEvent::Dismissed(id));
        }
        removed
    }

    /// Visible notifications, oldest first. Expired entries are pruned and
    /// announced as dismissed.
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let (visible, expired) = {
            let mut entries = self.inner.entries.lock();
            let (live, expired): (Vec<Entry>, Vec<Entry>) =
                std::mem::take(&mut *entries).into_iter().partition(|e| e.expires_at > now);
            *entries = live;
            let visible: Vec<Notification> = entries.iter().map(|e| e.notification.clone()).collect();
            (visible, expired)
        };

        for entry in expired {
            debug!("Notification {} expired", entry.notification.id);
            let _ = self.inner.tx.send(NotificationEvent::Dismissed(entry.notification.id));
        }
        visible
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.tx.subscribe()
    }
}
