//! Altseason Monitor - Entry Point
//!
//! Loads configuration, wires the fetcher and snapshot store into an
//! evaluator, and runs one evaluation cycle per day at the configured
//! local time. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the evaluator (HTTP client, credentials, plans, store)
//! 4. Spawn metrics server (/metrics) and health server (/live + /ready)
//! 5. Spawn config watcher (60s poll)
//! 6. Scheduler loop: sleep until the next run, then run one cycle
//! 7. Wait for SIGINT → broadcast shutdown → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use altseason_monitor::adapters::http::{Credentials, HttpClient, HttpClientConfig};
use altseason_monitor::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use altseason_monitor::adapters::persistence::SnapshotFile;
use altseason_monitor::adapters::sources::build_plans;
use altseason_monitor::config::hot_reload::ConfigWatcher;
use altseason_monitor::config::{self, AppConfig};
use altseason_monitor::domain::error::CycleError;
use altseason_monitor::ports::HttpTransport;
use altseason_monitor::usecases::{
    report, DailySchedule, EvaluationSettings, Evaluator, MetricFetcher, SnapshotStore,
};

const CONFIG_PATH: &str = "config.toml";
const RELOAD_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config(CONFIG_PATH).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        metrics = config.metrics.len(),
        daily_at = %config.schedule.daily_at,
        utc_offset_hours = config.schedule.utc_offset_hours,
        "Starting Altseason Monitor"
    );

    // ── 3. Build the evaluator ──────────────────────────────
    let mut monitor = Monitor::build(&config).await?;

    // ── 4. Spawn metrics + health servers ───────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());
    let mut server_handles = Vec::new();

    if config.server.enabled {
        let metrics_shutdown = shutdown_tx.subscribe();
        let metrics_ref = Arc::clone(&metrics);
        let address = config.server.metrics_address.clone();
        server_handles.push(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(address, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        }));

        let health_shutdown = shutdown_tx.subscribe();
        let health_server = HealthServer::new(Arc::clone(&health), config.server.health_port);
        server_handles.push(tokio::spawn(async move {
            if let Err(e) = health_server.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 5. Spawn config watcher ─────────────────────────────
    let (mut watcher, mut config_rx) = ConfigWatcher::new(CONFIG_PATH, config.clone(), RELOAD_INTERVAL);
    let watcher_shutdown = shutdown_tx.subscribe();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown).await {
            error!(error = %e, "Config watcher failed");
        }
    });

    // ── 6. Scheduler loop ───────────────────────────────────
    let mut config = config;
    let mut watching = true;
    if config.schedule.run_on_start {
        run_and_report(&monitor, &config, &metrics, &health).await;
    }

    loop {
        let now = Utc::now();
        let next = monitor.schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %monitor.schedule.local(next), wait_secs = wait.as_secs(), "Next cycle scheduled");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                run_and_report(&monitor, &config, &metrics, &health).await;
            }
            changed = config_rx.changed(), if watching => {
                if changed.is_err() {
                    warn!("Config watcher stopped, keeping current configuration");
                    watching = false;
                    continue;
                }
                let new_config = config_rx.borrow_and_update().clone();
                match monitor.reload(&config, &new_config).await {
                    Ok(()) => {
                        config = new_config;
                        info!(metrics = config.metrics.len(), "Evaluator rebuilt from reloaded config");
                    }
                    Err(e) => warn!(error = %e, "Reloaded config rejected, keeping previous evaluator"),
                }
            }
        }
    }

    // ── 7. Graceful shutdown ────────────────────────────────
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    let _ = tokio::time::timeout(Duration::from_secs(5), watcher_handle).await;
    for handle in server_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Everything rebuilt from one configuration.
struct Monitor {
    evaluator: Evaluator,
    schedule: DailySchedule,
}

impl Monitor {
    async fn build(config: &AppConfig) -> Result<Self> {
        let fetcher = build_fetcher(config)?;
        let schedule = DailySchedule::from_config(&config.schedule)?;
        let store = open_store(config).await?;

        Ok(Self {
            evaluator: Evaluator::new(fetcher, store, EvaluationSettings::from_config(config)),
            schedule,
        })
    }

    /// Apply a reloaded config. Nothing changes unless the whole config is usable.
    ///
    /// The in-memory history is kept while the store path is unchanged, so
    /// snapshots that failed to save are not lost on reload.
    async fn reload(&mut self, previous: &AppConfig, config: &AppConfig) -> Result<()> {
        let fetcher = build_fetcher(config)?;
        let schedule = DailySchedule::from_config(&config.schedule)?;
        let settings = EvaluationSettings::from_config(config);

        if config.store.path == previous.store.path {
            self.evaluator
                .reconfigure(fetcher, settings, config.store.retention_secs(), Utc::now().timestamp());
        } else {
            let store = open_store(config).await?;
            self.evaluator = Evaluator::new(fetcher, store, settings);
        }
        self.schedule = schedule;
        Ok(())
    }
}

fn build_fetcher(config: &AppConfig) -> Result<MetricFetcher> {
    let credentials = Arc::new(Credentials::from_env(&config.http.credential_env));
    if credentials.len() < config.http.credential_env.len() {
        warn!(
            resolved = credentials.len(),
            configured = config.http.credential_env.len(),
            "Some credentials are unset; sources that need them will be skipped"
        );
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(
        HttpClient::new(HttpClientConfig::from(&config.http)).context("Failed to create HTTP client")?,
    );
    MetricFetcher::new(build_plans(config, transport, credentials)).context("Failed to order metric plans")
}

async fn open_store(config: &AppConfig) -> Result<SnapshotStore> {
    let file = SnapshotFile::new(&config.store.path)
        .await
        .with_context(|| format!("Failed to prepare snapshot store at {}", config.store.path))?;
    Ok(SnapshotStore::open(Arc::new(file), config.store.retention_secs(), Utc::now().timestamp()).await)
}

/// Run one cycle, print the report and update observability state.
async fn run_and_report(monitor: &Monitor, config: &AppConfig, metrics: &MetricsRegistry, health: &HealthState) {
    let now = Utc::now();
    match monitor.evaluator.run_cycle(now.timestamp()).await {
        Ok(result) => {
            for line in report::assemble(&result, config, monitor.schedule.local(now)) {
                println!("{line}");
            }

            metrics.observe_cycle(&result);
            if let Some(stored) = monitor.evaluator.stored_snapshots() {
                metrics.snapshots_stored.set(stored as i64);
            }
            health.set_store_healthy(monitor.evaluator.store_healthy().await);
            health.mark_cycle_completed();
        }
        Err(CycleError::CycleInProgress) => warn!("Cycle already running, request skipped"),
    }
}
