//! Config Hot-Reload - Poll config.toml for Changes
//!
//! Periodically re-reads config.toml and compares its content hash with
//! the last loaded one. Valid changes are published on a
//! `tokio::sync::watch` channel so the scheduler can rebuild its
//! evaluator (new sources, thresholds, windows) without a restart.
//! Invalid edits are logged and the running config stays in place.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

/// Watches config.toml for changes and publishes reloaded configs.
pub struct ConfigWatcher {
    /// Path to config.toml.
    config_path: String,
    /// Poll period.
    interval: Duration,
    /// Watch channel sender for config updates.
    config_tx: watch::Sender<AppConfig>,
    /// Hash of the last successfully loaded content.
    last_hash: Option<u64>,
}

impl ConfigWatcher {
    /// Create a watcher polling every `interval`.
    ///
    /// Returns the watcher and a receiver that starts out holding
    /// `initial_config`.
    pub fn new(
        config_path: &str,
        initial_config: AppConfig,
        interval: Duration,
    ) -> (Self, watch::Receiver<AppConfig>) {
        let (config_tx, config_rx) = watch::channel(initial_config);

        let watcher = Self {
            config_path: config_path.to_string(),
            interval,
            config_tx,
            last_hash: None,
        };

        (watcher, config_rx)
    }

    /// Run the poll loop until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(path = %self.config_path))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            "Config watcher started"
        );

        self.last_hash = self.compute_hash().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Config watcher shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.check_and_reload().await;
                }
            }
        }
    }

    /// Reload if the file content changed. Returns true when a new
    /// config was published.
    pub async fn check_and_reload(&mut self) -> bool {
        let new_hash = self.compute_hash().await;

        if new_hash.is_none() || new_hash == self.last_hash {
            debug!("Config unchanged");
            return false;
        }

        info!("Config change detected, reloading");

        match super::loader::load_config(&self.config_path) {
            Ok(new_config) => {
                self.last_hash = new_hash;
                if self.config_tx.send(new_config).is_err() {
                    warn!("No config subscribers, update dropped");
                    false
                } else {
                    info!("Config reloaded successfully");
                    true
                }
            }
            Err(e) => {
                // Remember the bad content so it is reported once.
                self.last_hash = new_hash;
                warn!(error = %format!("{e:#}"), "Failed to reload config, keeping current");
                false
            }
        }
    }

    async fn compute_hash(&self) -> Option<u64> {
        let content = tokio::fs::read_to_string(&self.config_path).await.ok()?;

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }
}
