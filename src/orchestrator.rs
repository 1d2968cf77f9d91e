//! Session & Navigation Orchestrator
//!
//! Top-level controller composing the authenticator, navigation guard and
//! module registry:
//!
//! ```text
//! Booting ──restore ok──────────────► Authenticated ◄── login ok ── Authenticating
//!    │                                   │   ▲                          ▲
//!    └──no / expired session──► LoggedOut ───┴──────── login ───────────┘
//!                                   ▲        │
//!           logout / expiry ────────┘        └──► ShuttingDown ◄── shutdown signal
//! ```
//!
//! Transitions happen only in response to discrete events (boot, login,
//! logout, hash change, shutdown); nothing polls. The active view flips
//! synchronously with the guard decision; module initialization for the
//! new view runs afterwards and its result is dropped if the user has
//! navigated on in the meantime. Under [`Orchestrator::run`] that
//! initialization and the remote login run on spawned tasks, so a later
//! signal is never queued behind them.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::auth::{AuthBackend, AuthError, AuthStatus, Authenticator, HttpAuthBackend, OfflineBackend};
use crate::config::Config;
use crate::events::{EventBus, SessionEvent};
use crate::lifecycle::{FeatureModule, InitOutcome, ModuleFactory, ModuleRegistry};
use crate::navigation::{
    initial_target, parse_fragment, Decision, NavigationGuard, NullShell, ViewDescriptor, ViewShell,
    ViewTable, DEFAULT_VIEW, LOGIN_VIEW,
};
use crate::notifications::Notifier;
use crate::session::{Connectivity, SessionStore, Theme, User};
use crate::storage::{KeyValueStore, MemoryStore, THEME_KEY};

/// Redirects followed before giving up on a navigation
const MAX_REDIRECTS: usize = 4;

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Booting,
    LoggedOut,
    Authenticating,
    Authenticated,
    ShuttingDown,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Booting => "booting",
            State::LoggedOut => "logged-out",
            State::Authenticating => "authenticating",
            State::Authenticated => "authenticated",
            State::ShuttingDown => "shutting-down",
        }
    }
}

/// External inputs driving [`Orchestrator::run`]
pub enum Signal {
    HashChange(String),
    Login { username: String, password: String },
    Logout,
    SetTheme(Theme),
    Shutdown,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::HashChange(fragment) => f.debug_tuple("HashChange").field(fragment).finish(),
            Signal::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Signal::Logout => f.write_str("Logout"),
            Signal::SetTheme(theme) => f.debug_tuple("SetTheme").field(theme).finish(),
            Signal::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// View became active; `init` reports its primary module
    Activated { view: String, init: InitOutcome },
    /// Requested view was already active; nothing happened
    Unchanged(String),
    /// No transition (shutting down, or redirects did not settle)
    Ignored,
}

impl NavigationOutcome {
    pub fn view(&self) -> Option<&str> {
        match self {
            NavigationOutcome::Activated { view, .. } | NavigationOutcome::Unchanged(view) => Some(view),
            NavigationOutcome::Ignored => None,
        }
    }
}

/// Point-in-time view of the console
#[derive(Debug, Clone)]
pub struct Status {
    pub state: State,
    pub active_view: Option<String>,
    pub user: Option<User>,
    pub theme: Theme,
    pub connectivity: Connectivity,
    pub modules: Vec<String>,
    pub notifications: usize,
}

pub struct OrchestratorBuilder {
    config: Config,
    backend: Option<Arc<dyn AuthBackend>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    shell: Arc<dyn ViewShell>,
    views: ViewTable,
    bindings: Vec<(String, String)>,
    modules: ModuleFactory,
}

impl OrchestratorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            backend: None,
            storage: None,
            shell: Arc::new(NullShell),
            views: ViewTable::standard(),
            bindings: Vec::new(),
            modules: Arc::new(Vec::<FeatureModule>::new),
        }
    }

    pub fn backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn shell(mut self, shell: Arc<dyn ViewShell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn views(mut self, views: impl IntoIterator<Item = ViewDescriptor>) -> Self {
        self.views = ViewTable::new(views);
        self
    }

    /// Make `module` the primary module of `view_id`
    pub fn bind_view(mut self, view_id: impl Into<String>, module: impl Into<String>) -> Self {
        self.bindings.push((view_id.into(), module.into()));
        self
    }

    /// Factory producing fresh module instances for every session
    pub fn modules<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<FeatureModule> + Send + Sync + 'static,
    {
        self.modules = Arc::new(factory);
        self
    }

    /// Without an explicit backend the HTTP backend from the configuration
    /// is used (offline if it cannot be built); without storage, an
    /// in-memory store.
    pub fn build(self) -> Arc<Orchestrator> {
        let auth_config = self.config.auth();

        let backend: Arc<dyn AuthBackend> = match self.backend {
            Some(backend) => backend,
            None => match HttpAuthBackend::new(auth_config.login_url.clone(), auth_config.timeout) {
                Ok(http) => Arc::new(http),
                Err(e) => {
                    warn!("HTTP auth backend unavailable, running offline: {}", e);
                    Arc::new(OfflineBackend)
                }
            },
        };
        let storage: Arc<dyn KeyValueStore> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStore::new()),
        };

        let session = Arc::new(SessionStore::new());
        let bus = EventBus::new();
        let notifier = Notifier::new(self.config.notification_ttl);

        let auth = Authenticator::new(auth_config, backend, session.clone(), storage.clone(), bus.clone());
        let guard = NavigationGuard::new(self.views, self.config.session_ttl);
        let registry = self
            .bindings
            .into_iter()
            .fold(ModuleRegistry::new(notifier.clone()), |r, (view, module)| r.bind_view(view, module));

        Arc::new(Orchestrator {
            auth,
            session,
            storage,
            guard,
            registry,
            modules: self.modules,
            shell: self.shell,
            notifier,
            bus,
            state: Mutex::new(State::Booting),
            transition: Mutex::new(()),
            login_cancelled: AtomicBool::new(false),
            active_view: RwLock::new(None),
            nav_generation: Arc::new(AtomicU64::new(0)),
            init_gate: tokio::sync::Mutex::new(()),
        })
    }
}

pub struct Orchestrator {
    auth: Authenticator,
    session: Arc<SessionStore>,
    storage: Arc<dyn KeyValueStore>,
    guard: NavigationGuard,
    registry: ModuleRegistry,
    modules: ModuleFactory,
    shell: Arc<dyn ViewShell>,
    notifier: Notifier,
    bus: EventBus,
    state: Mutex<State>,
    /// Serializes module registration, teardown and the end of a login
    transition: Mutex<()>,
    /// Set by a logout that arrives while a login is pending
    login_cancelled: AtomicBool,
    active_view: RwLock<Option<String>>,
    /// Bumped on every view activation
    nav_generation: Arc<AtomicU64>,
    /// Serializes per-view module initialization
    init_gate: tokio::sync::Mutex<()>,
}

/// Guard decision with the view already flipped
enum Routed {
    Activated { view: String, generation: u64 },
    Settled(NavigationOutcome),
}

impl Orchestrator {
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn state(&self) -> State {
        *self.state.lock()
    }

    pub fn active_view(&self) -> Option<String> {
        self.active_view.read().clone()
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn transition_to(&self, new_state: State) -> State {
        let old = std::mem::replace(&mut *self.state.lock(), new_state);
        if old != new_state {
            debug!("Orchestrator: {:?} -> {:?}", old, new_state);
        }
        old
    }

    /// Restore persisted state and resolve the initial view
    pub async fn boot(&self, fragment: Option<&str>) -> State {
        if self.state() != State::Booting {
            warn!("Boot requested in state {:?}; ignoring", self.state());
            return self.state();
        }
        info!("Booting console");

        self.restore_theme();
        self.auth.restore();

        match self.auth.check_current_auth() {
            AuthStatus::Authenticated(user) => {
                info!("Resuming session for '{}'", user.username);
                {
                    let _transition = self.transition.lock();
                    self.enter_authenticated();
                }
                let target = initial_target(fragment, true);
                self.navigate(&target).await;
                self.registry.initialize_unbound().await;
            }
            AuthStatus::Expired | AuthStatus::LoginRequired => {
                self.transition_to(State::LoggedOut);
                self.navigate(LOGIN_VIEW).await;
            }
        }

        self.state()
    }

    fn restore_theme(&self) {
        match self.storage.get(THEME_KEY) {
            Ok(Some(raw)) => match raw.parse::<Theme>() {
                Ok(theme) => self.session.set_theme(theme),
                Err(e) => warn!("Ignoring stored theme: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Cannot read theme preference: {}", e),
        }
    }

    /// Submit credentials. On success, modules are (re)registered and the
    /// dashboard is shown. A logout arriving meanwhile cancels the attempt.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let previous = {
            let mut state = self.state.lock();
            match *state {
                State::Booting | State::ShuttingDown => return Err(AuthError::Unavailable),
                State::Authenticating => return Err(AuthError::LoginInProgress),
                s @ (State::LoggedOut | State::Authenticated) => {
                    *state = State::Authenticating;
                    s
                }
            }
        };
        self.login_cancelled.store(false, Ordering::Release);
        debug!("Orchestrator: {:?} -> {:?}", previous, State::Authenticating);

        let result = self.auth.login(username, password).await;

        let result = {
            let _transition = self.transition.lock();
            if self.state() == State::ShuttingDown {
                debug!("Login finished during shutdown; not starting modules");
                return result;
            }
            if self.login_cancelled.swap(false, Ordering::AcqRel) {
                info!("Login for '{}' superseded by logout", username);
                if result.is_ok() {
                    self.auth.logout();
                }
                self.transition_to(State::LoggedOut);
                return Err(AuthError::Cancelled);
            }
            match result {
                Ok(user) => {
                    self.enter_authenticated();
                    Ok(user)
                }
                Err(e) => {
                    self.transition_to(previous);
                    Err(e)
                }
            }
        };

        match result {
            Ok(user) => {
                self.navigate(DEFAULT_VIEW).await;
                self.registry.initialize_unbound().await;
                self.notifier.success(format!("Welcome, {}", user.display_name));
                Ok(user)
            }
            Err(e) => {
                if e != AuthError::LoginInProgress {
                    self.notifier.error(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Register a fresh set of modules for the new session.
    /// Caller holds `transition`.
    fn enter_authenticated(&self) {
        if !self.registry.is_empty() {
            self.registry.teardown_all();
            self.reset_active_view();
        }

        for module in (self.modules)() {
            if let Err(e) = self.registry.register(module) {
                warn!("{}", e);
            }
        }

        self.transition_to(State::Authenticated);
        info!("Authenticated; {} module(s) registered", self.registry.len());
    }

    /// End the session, tear down modules and show the login view
    pub async fn logout(&self) {
        self.auth.logout();
        if self.end_session() {
            self.navigate(LOGIN_VIEW).await;
        }
    }

    /// Tear down modules and clear the session. A pending login is marked
    /// cancelled instead of changing state. Returns false when shutting down.
    fn end_session(&self) -> bool {
        let _transition = self.transition.lock();
        {
            let mut state = self.state.lock();
            match *state {
                State::ShuttingDown => return false,
                State::Authenticating => self.login_cancelled.store(true, Ordering::Release),
                old => {
                    *state = State::LoggedOut;
                    debug!("Orchestrator: {:?} -> {:?}", old, State::LoggedOut);
                }
            }
        }
        self.registry.teardown_all();
        self.session.clear();
        true
    }

    /// Drop the session if it has gone stale; true when it was dropped
    fn expire_now(&self) -> bool {
        if !self.auth.expire_if_stale() {
            return false;
        }
        if self.end_session() {
            self.notifier.warning("Session expired, please sign in again");
        }
        true
    }

    /// View to resolve for a fragment change, or `None` when ignored
    fn hash_target(&self, fragment: &str) -> Option<String> {
        if matches!(self.state(), State::Booting | State::ShuttingDown) {
            return None;
        }
        if self.expire_now() {
            return (self.state() != State::ShuttingDown).then(|| LOGIN_VIEW.to_string());
        }

        Some(parse_fragment(fragment).unwrap_or_else(|| {
            if self.auth.has_valid_session() {
                DEFAULT_VIEW.to_string()
            } else {
                LOGIN_VIEW.to_string()
            }
        }))
    }

    /// Location fragment changed
    pub async fn on_hash_change(&self, fragment: &str) -> NavigationOutcome {
        match self.hash_target(fragment) {
            Some(target) => self.navigate(&target).await,
            None => NavigationOutcome::Ignored,
        }
    }

    /// Resolve `requested` through the guard, following redirects, and
    /// activate the resulting view
    pub async fn navigate(&self, requested: &str) -> NavigationOutcome {
        let routed = self.route(requested);
        self.complete(routed).await
    }

    /// Flip the view now; module init (and optionally the modules not bound
    /// to a view) runs on a spawned task
    fn navigate_in_background(self: &Arc<Self>, requested: &str, start_unbound: bool) {
        let routed = self.route(requested);
        let console = Arc::clone(self);
        tokio::spawn(async move {
            console.complete(routed).await;
            if start_unbound {
                console.registry.initialize_unbound().await;
            }
        });
    }

    fn route(&self, requested: &str) -> Routed {
        if self.state() == State::ShuttingDown {
            return Routed::Settled(NavigationOutcome::Ignored);
        }

        let mut target = requested.to_string();
        for _ in 0..=MAX_REDIRECTS {
            let session = self.session.snapshot();
            let active = self.active_view();

            match self.guard.resolve(&target, &session, active.as_deref()) {
                Decision::Unchanged(view) => {
                    debug!("View '{}' already active", view);
                    return Routed::Settled(NavigationOutcome::Unchanged(view));
                }
                Decision::RedirectTo(next) => {
                    debug!("Redirect '{}' -> '{}'", target, next);
                    target = next;
                }
                Decision::Allow(view) => {
                    if view.id != requested {
                        self.shell.replace_location(&view.id);
                    }
                    let generation = self.activate(&view);
                    return Routed::Activated {
                        view: view.id,
                        generation,
                    };
                }
            }
        }

        warn!("Navigation to '{}' did not settle; keeping current view", requested);
        Routed::Settled(NavigationOutcome::Ignored)
    }

    async fn complete(&self, routed: Routed) -> NavigationOutcome {
        match routed {
            Routed::Activated { view, generation } => {
                let init = self.init_view(&view, generation).await;
                NavigationOutcome::Activated { view, init }
            }
            Routed::Settled(outcome) => outcome,
        }
    }

    /// Flip the logical active view; returns the new navigation generation
    fn activate(&self, view: &ViewDescriptor) -> u64 {
        let (previous, generation) = {
            let mut active = self.active_view.write();
            let previous = active.replace(view.id.clone());
            (previous, self.nav_generation.fetch_add(1, Ordering::AcqRel) + 1)
        };

        if let Some(previous) = previous.filter(|p| *p != view.id) {
            self.shell.deactivate(&previous);
        }
        self.shell.activate(view);
        self.shell.highlight(&view.id);
        info!("Active view: {}", view.id);
        generation
    }

    fn reset_active_view(&self) {
        if let Some(previous) = self.active_view.write().take() {
            self.shell.deactivate(&previous);
        }
        self.nav_generation.fetch_add(1, Ordering::AcqRel);
    }

    async fn init_view(&self, view_id: &str, generation: u64) -> InitOutcome {
        if self.registry.primary_module(view_id).is_none() {
            return InitOutcome::NoModule;
        }

        let _gate = self.init_gate.lock().await;
        if self.nav_generation.load(Ordering::Acquire) != generation {
            debug!("Skipping init for '{}': navigated away", view_id);
            return InitOutcome::Stale(view_id.to_string());
        }

        let nav = self.nav_generation.clone();
        self.registry
            .ensure_initialized(view_id, move || nav.load(Ordering::Acquire) == generation)
            .await
    }

    /// Persist and announce a theme preference
    pub fn set_theme(&self, theme: Theme) {
        self.session.set_theme(theme);
        if let Err(e) = self.storage.set(THEME_KEY, theme.as_str()) {
            warn!("Theme preference not persisted: {}", e);
        }
        self.bus.publish(SessionEvent::ThemeChanged { theme });
    }

    /// Tear down modules for process exit. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let _transition = self.transition.lock();
        let previous = self.transition_to(State::ShuttingDown);
        if previous != State::ShuttingDown {
            info!("Shutting down");
        }
        self.registry.teardown_all();
    }

    pub fn status(&self) -> Status {
        let session = self.session.snapshot();
        Status {
            state: self.state(),
            active_view: self.active_view(),
            user: session.user,
            theme: session.theme,
            connectivity: session.connectivity,
            modules: self.registry.names(),
            notifications: self.notifier.active().len(),
        }
    }

    /// Apply one signal. The view flip happens before this returns; module
    /// init and the remote login run on spawned tasks. Returns false once the
    /// console is shutting down.
    pub fn handle(self: &Arc<Self>, signal: Signal) -> bool {
        debug!("Signal: {:?}", signal);
        match signal {
            Signal::HashChange(fragment) => {
                if let Some(target) = self.hash_target(&fragment) {
                    self.navigate_in_background(&target, false);
                }
            }
            Signal::Login { username, password } => {
                let console = Arc::clone(self);
                tokio::spawn(async move {
                    // failures are already reported through the notifier
                    let _ = console.login(&username, &password).await;
                });
            }
            Signal::Logout => {
                self.auth.logout();
                if self.end_session() {
                    self.navigate_in_background(LOGIN_VIEW, false);
                }
            }
            Signal::SetTheme(theme) => self.set_theme(theme),
            Signal::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// React to bus events published by other parties
    fn on_session_event(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Logout => {
                if self.state() == State::Authenticated && !self.session.is_authenticated() {
                    info!("Session ended elsewhere; tearing down");
                    if self.end_session() {
                        self.navigate_in_background(LOGIN_VIEW, false);
                    }
                }
            }
            SessionEvent::LoginSuccess { .. } => {
                let started = {
                    let _transition = self.transition.lock();
                    let elsewhere = self.state() == State::LoggedOut && self.session.is_authenticated();
                    if elsewhere {
                        info!("Session started elsewhere; starting modules");
                        self.enter_authenticated();
                    }
                    elsewhere
                };
                if started {
                    self.navigate_in_background(DEFAULT_VIEW, true);
                }
            }
            SessionEvent::AlreadyAuthenticated { .. } | SessionEvent::ThemeChanged { .. } => {}
        }
    }

    /// Event loop: consume signals and session events until shutdown or
    /// until every signal sender is gone
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<Signal>) {
        let mut events = self.bus.subscribe();
        info!("Orchestrator event loop started");

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        if !self.handle(signal) {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.on_session_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Orchestrator missed {} session event(s)", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
            }
        }

        info!("Orchestrator event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn orchestrator(inits: Arc<AtomicUsize>) -> Arc<Orchestrator> {
        Orchestrator::builder(Config::default())
            .backend(Arc::new(OfflineBackend))
            .bind_view("dashboard", "dashboard")
            .modules(move || {
                let inits = inits.clone();
                vec![FeatureModule::new("dashboard").on_initialize(move || {
                    let inits = inits.clone();
                    async move {
                        inits.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), anyhow::Error>(())
                    }
                })]
            })
            .build()
    }

    #[tokio::test]
    async fn test_boot_without_session_shows_login() {
        let console = orchestrator(Arc::new(AtomicUsize::new(0)));
        assert_eq!(console.boot(Some("#reports")).await, State::LoggedOut);
        assert_eq!(console.active_view().as_deref(), Some("login"));
        assert!(console.registry().is_empty());
    }

    #[tokio::test]
    async fn test_login_then_noop_navigation() {
        let inits = Arc::new(AtomicUsize::new(0));
        let console = orchestrator(inits.clone());
        console.boot(None).await;

        console.login("operador", "op123").await.unwrap();
        assert_eq!(console.state(), State::Authenticated);
        assert_eq!(console.active_view().as_deref(), Some("dashboard"));
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        let outcome = console.on_hash_change("#dashboard").await;
        assert_eq!(outcome, NavigationOutcome::Unchanged("dashboard".into()));
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_login_restores_state() {
        let console = orchestrator(Arc::new(AtomicUsize::new(0)));
        console.boot(None).await;

        assert_eq!(
            console.login("operador", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(console.state(), State::LoggedOut);
        assert_eq!(console.notifier().active().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejected_before_boot_and_after_shutdown() {
        let console = orchestrator(Arc::new(AtomicUsize::new(0)));
        assert_eq!(console.login("operador", "op123").await, Err(AuthError::Unavailable));

        console.boot(None).await;
        console.shutdown();
        assert_eq!(console.login("operador", "op123").await, Err(AuthError::Unavailable));
        assert_eq!(console.navigate("dashboard").await, NavigationOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_redirects_that_never_settle_keep_current_view() {
        // no dashboard declared: unknown-route fallback loops
        let console = Orchestrator::builder(Config::default())
            .backend(Arc::new(OfflineBackend))
            .views([ViewDescriptor::public("login"), ViewDescriptor::authenticated("alerts")])
            .build();
        console.boot(None).await;
        console.login("operador", "op123").await.unwrap();
        assert_eq!(console.active_view().as_deref(), Some("login"));

        assert!(matches!(
            console.navigate("alerts").await,
            NavigationOutcome::Activated { ref view, .. } if view == "alerts"
        ));
        assert_eq!(console.navigate("missing").await, NavigationOutcome::Ignored);
        assert_eq!(console.active_view().as_deref(), Some("alerts"));
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let console = orchestrator(Arc::new(AtomicUsize::new(0)));
        console.boot(None).await;
        console.login("supervisor", "sup123").await.unwrap();
        console.set_theme(Theme::Supervisor);

        let status = console.status();
        assert_eq!(status.state, State::Authenticated);
        assert_eq!(status.theme, Theme::Supervisor);
        assert_eq!(status.modules, vec!["dashboard".to_string()]);
        assert_eq!(status.user.map(|u| u.username).as_deref(), Some("supervisor"));
    }
}
