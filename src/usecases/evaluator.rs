//! Evaluator - One Evaluation Cycle End to End
//!
//! `run_cycle(now)` fetches the metric vector, computes short and long
//! window trends against stored history, evaluates the signals and
//! appends the new snapshot. At most one cycle runs at a time; a cycle
//! requested while another is in flight is rejected, never queued.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::fetcher::{FetchOutcome, MetricFetcher};
use super::store::SnapshotStore;
use crate::config::AppConfig;
use crate::domain::error::CycleError;
use crate::domain::metric::MetricVector;
use crate::domain::signals::{evaluate, AlertLevel, SignalReport, SignalRules};
use crate::domain::snapshot::Snapshot;
use crate::domain::trend::{Trend, TrendBands};

/// Everything a cycle needs besides the fetcher and the store.
#[derive(Debug, Clone)]
pub struct EvaluationSettings {
  /// Short comparison window (4h by default).
  pub short_window_secs: i64,
  /// Long comparison window (24h by default).
  pub long_window_secs: i64,
  pub signals: SignalRules,
  /// Band profile per metric name.
  pub bands: BTreeMap<String, TrendBands>,
}

impl EvaluationSettings {
  pub fn from_config(config: &AppConfig) -> Self {
    let bands = config
      .metrics
      .iter()
      .map(|m| (m.name.clone(), *config.trend.bands(m.trend_profile())))
      .collect();

    Self {
      short_window_secs: config.windows.short_secs(),
      long_window_secs: config.windows.long_secs(),
      signals: config.signals.clone(),
      bands,
    }
  }

  fn bands_for(&self, metric: &str, relative: bool) -> TrendBands {
    self.bands.get(metric).copied().unwrap_or(if relative {
      TrendBands::RELATIVE
    } else {
      TrendBands::POINT
    })
  }
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
  /// Correlates every log line of the cycle.
  pub cycle_id: Uuid,
  /// Cycle time, epoch seconds.
  pub timestamp: i64,
  pub vector: MetricVector,
  /// Trends against the short window, only where computable.
  pub deltas_4h: BTreeMap<String, Trend>,
  /// Trends against the long window, only where computable.
  pub deltas_24h: BTreeMap<String, Trend>,
  pub signals: SignalReport,
  pub level: AlertLevel,
  /// Whether the snapshot reached durable storage.
  pub persisted: bool,
  pub outcomes: BTreeMap<String, FetchOutcome>,
  pub duration: Duration,
}

/// Runs evaluation cycles against one store.
pub struct Evaluator {
  fetcher: MetricFetcher,
  /// The cycle guard. Holds the store for the whole cycle.
  store: Mutex<SnapshotStore>,
  settings: EvaluationSettings,
}

impl Evaluator {
  pub fn new(fetcher: MetricFetcher, store: SnapshotStore, settings: EvaluationSettings) -> Self {
    Self {
      fetcher,
      store: Mutex::new(store),
      settings,
    }
  }

  pub fn settings(&self) -> &EvaluationSettings {
    &self.settings
  }

  pub fn fetcher(&self) -> &MetricFetcher {
    &self.fetcher
  }

  /// Number of stored snapshots, or `None` while a cycle holds the store.
  pub fn stored_snapshots(&self) -> Option<usize> {
    self.store.try_lock().ok().map(|s| s.len())
  }

  /// Whether the backing repository can accept writes.
  pub async fn store_healthy(&self) -> bool {
    self.store.lock().await.is_healthy().await
  }

  /// Swap in a new fetcher and settings, keeping the in-memory history.
  ///
  /// Snapshots whose save failed survive the swap and are written by
  /// the next successful append.
  pub fn reconfigure(
    &mut self,
    fetcher: MetricFetcher,
    settings: EvaluationSettings,
    retention_secs: i64,
    now: i64,
  ) {
    let pruned = self.store.get_mut().set_retention(retention_secs, now);
    self.fetcher = fetcher;
    self.settings = settings;
    info!(pruned, snapshots = self.store.get_mut().len(), "Evaluator reconfigured");
  }

  /// Run one cycle at `now` (epoch seconds).
  ///
  /// Data problems never fail a cycle: unavailable metrics flow through
  /// and a persistence failure is reported as `persisted = false`.
  #[instrument(skip(self))]
  pub async fn run_cycle(&self, now: i64) -> Result<EvaluationResult, CycleError> {
    let mut store = self
      .store
      .try_lock()
      .map_err(|_| CycleError::CycleInProgress)?;

    let cycle_id = Uuid::new_v4();
    let started = Instant::now();
    info!(%cycle_id, "Evaluation cycle started");

    // Stale history must not answer window lookups.
    store.prune(now);

    let fetched = self.fetcher.fetch_all().await;
    let vector = fetched.vector;

    let deltas_4h = self.trends(&store, &vector, now.saturating_sub(self.settings.short_window_secs));
    let deltas_24h = self.trends(&store, &vector, now.saturating_sub(self.settings.long_window_secs));

    let signals = evaluate(&vector, &self.settings.signals);
    let level = signals.level;

    let persisted = match store.append(Snapshot::new(now, vector.clone()), now).await {
      Ok(()) => true,
      Err(e) => {
        error!(%cycle_id, error = %e, snapshots = store.len(), "Snapshot not persisted");
        false
      }
    };

    let duration = started.elapsed();
    info!(
      %cycle_id,
      active_signals = signals.active_count,
      level = %level,
      unavailable = vector.unavailable_names().len(),
      persisted,
      duration_ms = duration.as_millis() as u64,
      "Evaluation cycle complete"
    );

    Ok(EvaluationResult {
      cycle_id,
      timestamp: now,
      vector,
      deltas_4h,
      deltas_24h,
      signals,
      level,
      persisted,
      outcomes: fetched.outcomes,
      duration,
    })
  }

  fn trends(
    &self,
    store: &SnapshotStore,
    vector: &MetricVector,
    target_ts: i64,
  ) -> BTreeMap<String, Trend> {
    vector
      .iter()
      .filter_map(|(name, metric)| {
        let bands = self.settings.bands_for(name, metric.kind.is_relative());
        Trend::compute(
          metric.kind,
          &bands,
          metric.value.as_option(),
          store.nearest_at_or_before(name, target_ts),
        )
        .map(|trend| (name.to_string(), trend))
      })
      .collect()
  }
}
