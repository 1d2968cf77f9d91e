//! Telemetry Console - Entry Point
//!
//! Interactive shell driving the orchestrator from stdin:
//! `login <user> <password>`, `go <view>`, `logout`, `theme <name>`,
//! `status`, `quit`. Ctrl-C triggers the shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use telemetry_console::{
    Config, FeatureModule, FileStore, KeyValueStore, MemoryStore, NotificationEvent, OfflineBackend,
    Orchestrator, Signal, ViewDescriptor, ViewShell,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Prints view switches to stdout
struct ConsoleShell;

impl ViewShell for ConsoleShell {
    fn activate(&self, view: &ViewDescriptor) {
        println!("==> [{}]", view.id);
    }

    fn deactivate(&self, _view_id: &str) {}

    fn replace_location(&self, view_id: &str) {
        println!("    (location #{})", view_id);
    }
}

/// Demo feature modules; the real ones live in the rendering shell
fn demo_modules() -> Vec<FeatureModule> {
    let dashboard_ready = Arc::new(AtomicBool::new(false));
    let transport_up = Arc::new(AtomicBool::new(false));

    let (ready_init, ready_check) = (dashboard_ready.clone(), dashboard_ready);
    let (up_init, up_check, up_destroy) = (transport_up.clone(), transport_up.clone(), transport_up);

    vec![
        FeatureModule::new("transport")
            .on_initialize(move || {
                let up = up_init.clone();
                async move {
                    info!("transport: connecting telemetry stream");
                    up.store(true, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            })
            .ready_when(move || up_check.load(Ordering::SeqCst))
            .on_destroy(move || {
                if up_destroy.swap(false, Ordering::SeqCst) {
                    info!("transport: disconnected");
                }
                Ok(())
            }),
        FeatureModule::new("dashboard")
            .on_initialize(move || {
                let ready = ready_init.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    ready.store(true, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            })
            .ready_when(move || ready_check.load(Ordering::SeqCst))
            .on_show(|| println!("    dashboard widgets live")),
        FeatureModule::new("alerts").on_show(|| println!("    alert history loaded")),
    ]
}

fn print_help() {
    println!("Commands:");
    println!("  login <user> <password>   Sign in");
    println!("  go <view>                 Navigate (login, dashboard, alerts, reports, config)");
    println!("  logout                    Sign out");
    println!("  theme <operator|supervisor>");
    println!("  status                    Show session state");
    println!("  quit                      Shut down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let offline = args.iter().any(|a| a == "--offline");
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let json_logs = args.iter().any(|a| a == "--json");
    let route = args
        .iter()
        .position(|a| a == "--route")
        .and_then(|i| args.get(i + 1))
        .cloned();

    if help_mode {
        println!("Telemetry Console v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: telemetry-console [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --route <fragment>  Initial location fragment (e.g. #alerts)");
        println!("  --offline           Skip the remote auth service");
        println!("  --ephemeral         Do not persist session state");
        println!("  --json              JSON logs on stderr");
        println!("  --help, -h          Show this help");
        println!();
        println!("Environment variables:");
        println!("  TELEMETRY_API_URL               Auth service base URL");
        println!("  TELEMETRY_AUTH_TIMEOUT_SECS     Remote login timeout (default: 10)");
        println!("  TELEMETRY_SESSION_TTL_HOURS     Session lifetime (default: 24)");
        println!("  TELEMETRY_STATE_PATH            Persisted state file");
        println!("  TELEMETRY_ALLOW_LOCAL_FALLBACK  Accept demo credentials (default: true)");
        return Ok(());
    }

    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Telemetry Console v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let storage: Arc<dyn KeyValueStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&config.state_path))
    };

    let mut builder = Orchestrator::builder(config)
        .storage(storage)
        .shell(Arc::new(ConsoleShell))
        .bind_view("dashboard", "dashboard")
        .bind_view("alerts", "alerts")
        .modules(demo_modules);
    if offline {
        builder = builder.backend(Arc::new(OfflineBackend));
    }
    let console = builder.build();

    // Toasts
    let mut feed = console.notifier().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = feed.recv().await {
            if let NotificationEvent::Shown(n) = event {
                println!("    [{}] {}", n.severity, n.message);
            }
        }
    });

    console.boot(route.as_deref()).await;
    print_help();

    let (tx, rx) = mpsc::channel::<Signal>(32);
    let event_loop = tokio::spawn(console.clone().run(rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin: {}", e);
                        break;
                    }
                };

                let parts: Vec<&str> = line.split_whitespace().collect();
                let signal = match parts.as_slice() {
                    [] => continue,
                    ["login", user, password] => Signal::Login {
                        username: user.to_string(),
                        password: password.to_string(),
                    },
                    ["go", view] => Signal::HashChange(format!("#{}", view)),
                    ["logout"] => Signal::Logout,
                    ["theme", name] => match name.parse() {
                        Ok(theme) => Signal::SetTheme(theme),
                        Err(e) => {
                            println!("    {}", e);
                            continue;
                        }
                    },
                    ["status"] => {
                        let status = console.status();
                        println!("    state:    {}", status.state.as_str());
                        println!("    view:     {}", status.active_view.as_deref().unwrap_or("-"));
                        println!(
                            "    user:     {}",
                            status
                                .user
                                .map(|u| format!("{} ({})", u.display_name, u.role))
                                .unwrap_or_else(|| "-".to_string())
                        );
                        println!("    theme:    {}", status.theme);
                        println!("    modules:  {}", status.modules.join(", "));
                        continue;
                    }
                    ["quit"] | ["exit"] => break,
                    _ => {
                        print_help();
                        continue;
                    }
                };

                if tx.send(signal).await.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    // best effort: the loop may already be gone
    let _ = tx.send(Signal::Shutdown).await;
    drop(tx);
    event_loop.await?;
    console.shutdown();

    Ok(())
}
