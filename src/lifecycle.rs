//! Module Lifecycle Registry
//!
//! Tracks the feature modules (dashboard, alerting, telemetry transport, ...)
//! of one authenticated session and gives them uniform start/stop semantics:
//!
//! - **Capabilities**: every hook is optional; a missing hook is a no-op
//! - **Per-view init**: a view maps to at most one primary module, which is
//!   initialized (once at a time) and then shown
//! - **Teardown**: destroys every module in registration order, isolating
//!   failures, then empties the registry. Safe to repeat. An initialization
//!   still in flight at teardown is undone with a second `destroy()` once it
//!   finishes, so `destroy()` hooks must tolerate repeated calls.
//!
//! Hook failures never propagate; they are logged and surfaced through the
//! [`Notifier`].

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::notifications::Notifier;

pub type InitFn = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
pub type ReadyFn = Box<dyn Fn() -> bool + Send + Sync>;
pub type ShowFn = Box<dyn Fn() + Send + Sync>;
pub type DestroyFn = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Builds a fresh set of modules for each authenticated session
pub type ModuleFactory = Arc<dyn Fn() -> Vec<FeatureModule> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Module '{0}' is already registered")]
    Duplicate(String),
}

/// Feature module capability record
pub struct FeatureModule {
    name: String,
    initialize: Option<InitFn>,
    is_ready: Option<ReadyFn>,
    show: Option<ShowFn>,
    destroy: Option<DestroyFn>,
}

impl std::fmt::Debug for FeatureModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureModule")
            .field("name", &self.name)
            .field("initialize", &self.initialize.is_some())
            .field("is_ready", &self.is_ready.is_some())
            .field("show", &self.show.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

impl FeatureModule {
    /// Module with no capabilities
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialize: None,
            is_ready: None,
            show: None,
            destroy: None,
        }
    }

    pub fn on_initialize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.initialize = Some(Box::new(move || Box::pin(f())));
        self
    }

    pub fn ready_when<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.is_ready = Some(Box::new(f));
        self
    }

    pub fn on_show<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.show = Some(Box::new(f));
        self
    }

    pub fn on_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Missing readiness hook means "not ready"
    pub fn is_ready(&self) -> bool {
        self.is_ready.as_ref().is_some_and(|f| f())
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        match &self.initialize {
            Some(f) => f().await,
            None => Ok(()),
        }
    }

    fn show(&self) {
        if let Some(f) = &self.show {
            f();
        }
    }

    fn destroy(&self) -> anyhow::Result<()> {
        match &self.destroy {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// A registered module plus its initialization lock
pub struct RegisteredModule {
    module: FeatureModule,
    init_lock: Mutex<()>,
    /// Registry epoch at registration
    epoch: u64,
}

impl RegisteredModule {
    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn is_ready(&self) -> bool {
        self.module.is_ready()
    }
}

/// Outcome of a per-view initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// View has no primary module (or it is not registered)
    NoModule,
    /// Module initialized if needed, then shown
    Shown(String),
    /// Finished after the user navigated away or the session ended; not shown
    Stale(String),
    /// `initialize` failed; reported and swallowed
    Failed { module: String, reason: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub initialized: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub destroyed: Vec<String>,
    pub failed: Vec<String>,
}

/// Statistics for lifecycle monitoring
#[derive(Debug, Default)]
pub struct LifecycleStats {
    pub initializations: AtomicU64,
    pub init_failures: AtomicU64,
    pub teardowns: AtomicU64,
    pub teardown_failures: AtomicU64,
}

/// Snapshot of lifecycle statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStatsSnapshot {
    pub registered: usize,
    pub initializations: u64,
    pub init_failures: u64,
    pub teardowns: u64,
    pub teardown_failures: u64,
}

pub struct ModuleRegistry {
    modules: RwLock<Vec<Arc<RegisteredModule>>>,
    /// view id -> primary module name
    view_bindings: HashMap<String, String>,
    /// Bumped by every teardown; in-flight work from an older epoch is stale
    epoch: AtomicU64,
    notifier: Notifier,
    stats: LifecycleStats,
}

impl ModuleRegistry {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            modules: RwLock::new(Vec::new()),
            view_bindings: HashMap::new(),
            epoch: AtomicU64::new(0),
            notifier,
            stats: LifecycleStats::default(),
        }
    }

    /// Make `module` the primary module of `view_id`
    pub fn bind_view(mut self, view_id: impl Into<String>, module: impl Into<String>) -> Self {
        self.view_bindings.insert(view_id.into(), module.into());
        self
    }

    pub fn primary_module(&self, view_id: &str) -> Option<&str> {
        self.view_bindings.get(view_id).map(String::as_str)
    }

    pub fn register(&self, module: FeatureModule) -> Result<(), RegistryError> {
        let mut modules = self.modules.write();
        if modules.iter().any(|m| m.name() == module.name()) {
            return Err(RegistryError::Duplicate(module.name().to_string()));
        }
        debug!("Registered module '{}'", module.name());
        modules.push(Arc::new(RegisteredModule {
            module,
            init_lock: Mutex::new(()),
            epoch: self.epoch.load(Ordering::Acquire),
        }));
        Ok(())
    }

    /// Torn down since it was registered
    fn is_retired(&self, entry: &RegisteredModule) -> bool {
        self.epoch.load(Ordering::Acquire) != entry.epoch
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredModule>> {
        self.modules.read().iter().find(|m| m.name() == name).cloned()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.modules.read().iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Initialize every module that is not ready, in registration order.
    /// A failing module does not stop its siblings.
    pub async fn initialize_all(&self) -> InitReport {
        let modules: Vec<_> = self.modules.read().clone();
        self.initialize_each(modules).await
    }

    async fn initialize_each(&self, modules: Vec<Arc<RegisteredModule>>) -> InitReport {
        let mut report = InitReport::default();

        for entry in modules {
            let _lock = entry.init_lock.lock().await;
            if self.is_retired(&entry) || entry.is_ready() {
                continue;
            }
            let result = self.run_initialize(&entry).await;
            if self.is_retired(&entry) {
                self.abandon(&entry);
                continue;
            }
            match result {
                Ok(()) => report.initialized.push(entry.name().to_string()),
                Err(_) => report.failed.push(entry.name().to_string()),
            }
        }

        report
    }

    /// Initialize modules that are not the primary module of any view
    /// (transport, theming, ...). View modules start on navigation.
    pub async fn initialize_unbound(&self) -> InitReport {
        let modules: Vec<_> = self
            .modules
            .read()
            .iter()
            .filter(|m| !self.view_bindings.values().any(|bound| bound == m.name()))
            .cloned()
            .collect();
        self.initialize_each(modules).await
    }

    /// Bring up the primary module of `view_id` and show it.
    ///
    /// `is_current` is consulted after initialization; if it returns false
    /// (the user moved on) the module is not shown.
    pub async fn ensure_initialized<F>(&self, view_id: &str, is_current: F) -> InitOutcome
    where
        F: Fn() -> bool,
    {
        let Some(name) = self.primary_module(view_id) else {
            return InitOutcome::NoModule;
        };
        let Some(entry) = self.get(name) else {
            debug!("View '{}' bound to unregistered module '{}'", view_id, name);
            return InitOutcome::NoModule;
        };

        let _lock = entry.init_lock.lock().await;
        if self.is_retired(&entry) {
            debug!("Module '{}' torn down before init started", name);
            return InitOutcome::Stale(name.to_string());
        }

        if !entry.is_ready() {
            let result = self.run_initialize(&entry).await;
            if self.is_retired(&entry) {
                self.abandon(&entry);
                return InitOutcome::Stale(name.to_string());
            }
            if let Err(e) = result {
                return InitOutcome::Failed {
                    module: name.to_string(),
                    reason: e.to_string(),
                };
            }
        }

        if !is_current() {
            debug!("Discarding stale init result for '{}'", name);
            return InitOutcome::Stale(name.to_string());
        }

        entry.module.show();
        InitOutcome::Shown(name.to_string())
    }

    async fn run_initialize(&self, entry: &RegisteredModule) -> anyhow::Result<()> {
        let name = entry.name();
        debug!("Initializing module '{}'", name);

        match entry.module.initialize().await {
            Ok(()) => {
                self.stats.initializations.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.init_failures.fetch_add(1, Ordering::Relaxed);
                error!("Module '{}' failed to initialize: {:#}", name, e);
                self.notifier.error(format!("Could not load {}: {}", name, e));
                Err(e)
            }
        }
    }

    /// Undo an initialization that finished after its module was torn down
    fn abandon(&self, entry: &RegisteredModule) {
        debug!("Module '{}' finished init after teardown; destroying", entry.name());
        if let Err(e) = entry.module.destroy() {
            self.stats.teardown_failures.fetch_add(1, Ordering::Relaxed);
            warn!("Module '{}' failed to tear down: {:#}", entry.name(), e);
        }
    }

    /// Destroy and forget every module. Idempotent.
    pub fn teardown_all(&self) -> TeardownReport {
        let modules = {
            let mut modules = self.modules.write();
            self.epoch.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *modules)
        };

        let mut report = TeardownReport::default();
        if modules.is_empty() {
            return report;
        }

        for entry in &modules {
            match entry.module.destroy() {
                Ok(()) => report.destroyed.push(entry.name().to_string()),
                Err(e) => {
                    self.stats.teardown_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("Module '{}' failed to tear down: {:#}", entry.name(), e);
                    report.failed.push(entry.name().to_string());
                }
            }
        }

        self.stats.teardowns.fetch_add(1, Ordering::Relaxed);
        info!(
            "Tore down {} module(s), {} failure(s)",
            modules.len(),
            report.failed.len()
        );
        report
    }

    pub fn get_stats(&self) -> LifecycleStatsSnapshot {
        LifecycleStatsSnapshot {
            registered: self.len(),
            initializations: self.stats.initializations.load(Ordering::Relaxed),
            init_failures: self.stats.init_failures.load(Ordering::Relaxed),
            teardowns: self.stats.teardowns.load(Ordering::Relaxed),
            teardown_failures: self.stats.teardown_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        inits: AtomicUsize,
        shows: AtomicUsize,
        destroys: AtomicUsize,
        ready: AtomicBool,
    }

    fn counted(name: &str, calls: &Arc<Calls>) -> FeatureModule {
        let (i, r, s, d) = (calls.clone(), calls.clone(), calls.clone(), calls.clone());
        FeatureModule::new(name)
            .on_initialize(move || {
                let p = i.clone();
                async move {
                    p.inits.fetch_add(1, Ordering::SeqCst);
                    p.ready.store(true, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            })
            .ready_when(move || r.ready.load(Ordering::SeqCst))
            .on_show(move || {
                s.shows.fetch_add(1, Ordering::SeqCst);
            })
            .on_destroy(move || {
                d.destroys.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
    }

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(Notifier::default()).bind_view("dashboard", "dashboard")
    }

    #[tokio::test]
    async fn test_ensure_initialized_once_then_show() {
        let registry = registry();
        let calls = Arc::new(Calls::default());
        registry.register(counted("dashboard", &calls)).unwrap();

        assert_eq!(
            registry.ensure_initialized("dashboard", || true).await,
            InitOutcome::Shown("dashboard".into())
        );
        registry.ensure_initialized("dashboard", || true).await;

        assert_eq!(calls.inits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.shows.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_hooks_are_noops() {
        let registry = registry();
        registry.register(FeatureModule::new("dashboard")).unwrap();

        assert_eq!(
            registry.ensure_initialized("dashboard", || true).await,
            InitOutcome::Shown("dashboard".into())
        );
        assert_eq!(registry.ensure_initialized("reports", || true).await, InitOutcome::NoModule);
        assert_eq!(registry.teardown_all().destroyed, vec!["dashboard".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_init_is_reported_not_propagated() {
        let notifier = Notifier::new(Duration::from_secs(60));
        let registry = ModuleRegistry::new(notifier.clone()).bind_view("alerts", "alerts");
        registry
            .register(FeatureModule::new("alerts").on_initialize(|| async { Err::<(), _>(anyhow::anyhow!("feed down")) }))
            .unwrap();

        let outcome = registry.ensure_initialized("alerts", || true).await;
        assert!(matches!(outcome, InitOutcome::Failed { ref reason, .. } if reason == "feed down"));
        assert_eq!(notifier.active().len(), 1);
        assert_eq!(registry.get_stats().init_failures, 1);
    }

    #[tokio::test]
    async fn test_stale_result_is_not_shown() {
        let registry = registry();
        let calls = Arc::new(Calls::default());
        registry.register(counted("dashboard", &calls)).unwrap();

        let outcome = registry.ensure_initialized("dashboard", || false).await;
        assert_eq!(outcome, InitOutcome::Stale("dashboard".into()));
        assert_eq!(calls.inits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.shows.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_init_runs_once() {
        let registry = registry();
        let inits = Arc::new(AtomicUsize::new(0));
        let ready = Arc::new(AtomicBool::new(false));
        let (i, r, r2) = (inits.clone(), ready.clone(), ready.clone());
        registry
            .register(
                FeatureModule::new("dashboard")
                    .on_initialize(move || {
                        let (i, r) = (i.clone(), r.clone());
                        async move {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            i.fetch_add(1, Ordering::SeqCst);
                            r.store(true, Ordering::SeqCst);
                            Ok::<(), anyhow::Error>(())
                        }
                    })
                    .ready_when(move || r2.load(Ordering::SeqCst)),
            )
            .unwrap();

        tokio::join!(
            registry.ensure_initialized("dashboard", || true),
            registry.ensure_initialized("dashboard", || true),
        );
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = registry();
        registry.register(FeatureModule::new("dashboard")).unwrap();
        assert_eq!(
            registry.register(FeatureModule::new("dashboard")),
            Err(RegistryError::Duplicate("dashboard".into()))
        );
    }

    #[test]
    fn test_teardown_isolates_failures_and_is_idempotent() {
        let registry = registry();
        let calls = Arc::new(Calls::default());
        registry
            .register(FeatureModule::new("transport").on_destroy(|| anyhow::bail!("socket already closed")))
            .unwrap();
        registry.register(counted("dashboard", &calls)).unwrap();

        let report = registry.teardown_all();
        assert_eq!(report.failed, vec!["transport".to_string()]);
        assert_eq!(report.destroyed, vec!["dashboard".to_string()]);
        assert!(registry.is_empty());

        let again = registry.teardown_all();
        assert_eq!(again, TeardownReport::default());
        assert!(registry.is_empty());
        assert_eq!(calls.destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_all_isolates_failures() {
        let registry = registry();
        let calls = Arc::new(Calls::default());
        registry
            .register(FeatureModule::new("alerts").on_initialize(|| async { Err::<(), _>(anyhow::anyhow!("nope")) }))
            .unwrap();
        registry.register(counted("dashboard", &calls)).unwrap();

        let report = registry.initialize_all().await;
        assert_eq!(report.failed, vec!["alerts".to_string()]);
        assert_eq!(report.initialized, vec!["dashboard".to_string()]);
        assert!(registry.get("dashboard").unwrap().is_ready());

        // already ready: skipped
        let report = registry.initialize_all().await;
        assert!(report.initialized.is_empty());
        assert_eq!(calls.inits.load(Ordering::SeqCst), 1);
    }

    /// Module whose init takes `delay`; tracks whether it is "connected"
    fn slow_transport(name: &str, delay: Duration, up: &Arc<AtomicBool>, destroys: &Arc<AtomicUsize>) -> FeatureModule {
        let (u1, u2, d) = (up.clone(), up.clone(), destroys.clone());
        FeatureModule::new(name)
            .on_initialize(move || {
                let up = u1.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    up.store(true, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            })
            .on_destroy(move || {
                u2.store(false, Ordering::SeqCst);
                d.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
    }

    #[tokio::test]
    async fn test_teardown_during_init_undoes_late_init() {
        let registry = registry();
        let (up, destroys) = (Arc::new(AtomicBool::new(false)), Arc::new(AtomicUsize::new(0)));
        registry
            .register(slow_transport("dashboard", Duration::from_millis(60), &up, &destroys))
            .unwrap();

        let (outcome, report) = tokio::join!(registry.ensure_initialized("dashboard", || true), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            registry.teardown_all()
        });

        assert_eq!(report.destroyed, vec!["dashboard".to_string()]);
        assert_eq!(outcome, InitOutcome::Stale("dashboard".into()));
        assert!(!up.load(Ordering::SeqCst));
        assert_eq!(destroys.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_teardown_during_background_init() {
        let registry = registry();
        let (up, destroys) = (Arc::new(AtomicBool::new(false)), Arc::new(AtomicUsize::new(0)));
        let (later_up, later_destroys) = (Arc::new(AtomicBool::new(false)), Arc::new(AtomicUsize::new(0)));
        registry
            .register(slow_transport("transport", Duration::from_millis(60), &up, &destroys))
            .unwrap();
        registry
            .register(slow_transport("theming", Duration::ZERO, &later_up, &later_destroys))
            .unwrap();

        let (report, _) = tokio::join!(registry.initialize_unbound(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            registry.teardown_all()
        });

        assert!(report.initialized.is_empty());
        assert!(!up.load(Ordering::SeqCst));
        // never started: it was torn down before its turn
        assert!(!later_up.load(Ordering::SeqCst));
        assert_eq!(later_destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_registration_after_teardown_is_live() {
        let registry = registry();
        let calls = Arc::new(Calls::default());
        registry.register(FeatureModule::new("dashboard")).unwrap();
        registry.teardown_all();
        registry.register(counted("dashboard", &calls)).unwrap();

        assert_eq!(
            registry.ensure_initialized("dashboard", || true).await,
            InitOutcome::Shown("dashboard".into())
        );
        assert_eq!(calls.destroys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initialize_unbound_skips_view_modules() {
        let registry = registry();
        let (view, transport) = (Arc::new(Calls::default()), Arc::new(Calls::default()));
        registry.register(counted("dashboard", &view)).unwrap();
        registry.register(counted("transport", &transport)).unwrap();

        let report = registry.initialize_unbound().await;
        assert_eq!(report.initialized, vec!["transport".to_string()]);
        assert_eq!(view.inits.load(Ordering::SeqCst), 0);
        assert_eq!(transport.inits.load(Ordering::SeqCst), 1);
    }
}
