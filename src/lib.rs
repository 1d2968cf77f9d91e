//! Telemetry Console
//!
//! Client-side session and navigation orchestration for an industrial
//! telemetry dashboard.
//!
//! # Features
//!
//! - **Authentication**: remote login with bounded timeout, local credential fallback
//! - **Session persistence**: restore across restarts, 24h expiry heuristic
//! - **Role-gated navigation**: operator / supervisor view policies
//! - **Module lifecycle**: per-view initialization, idempotent teardown
//! - **Notifications**: fire-and-forget, auto-expiring feedback
//!
//! # Architecture
//!
//! ```text
//! signals (hash change, login, logout, shutdown)
//!     │
//!     ▼
//! Orchestrator ──► Authenticator ──► AuthBackend (HTTP) / local table
//!     │               │
//!     │               └──► SessionStore ◄──► KeyValueStore
//!     ├──► NavigationGuard ──► ViewShell
//!     ├──► ModuleRegistry ──► FeatureModule hooks
//!     └──► EventBus / Notifier ──► rendering shell
//! ```

pub mod auth;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod navigation;
pub mod notifications;
pub mod orchestrator;
pub mod session;
pub mod storage;

pub use auth::{AuthBackend, AuthConfig, AuthError, AuthStatus, Authenticator, BackendError, HttpAuthBackend, OfflineBackend};
pub use config::Config;
pub use events::{EventBus, SessionEvent};
pub use lifecycle::{FeatureModule, InitOutcome, ModuleRegistry, TeardownReport};
pub use navigation::{AccessPolicy, Decision, NavigationGuard, ViewDescriptor, ViewShell, ViewTable};
pub use notifications::{Notification, NotificationEvent, Notifier, Severity};
pub use orchestrator::{NavigationOutcome, Orchestrator, OrchestratorBuilder, Signal, State, Status};
pub use session::{Connectivity, Role, Session, SessionStore, Theme, TokenOrigin, User};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
