//! Prometheus Metrics Registry - Monitor Observability
//!
//! Registers and exposes Prometheus metrics for dashboards and alerting.
//! Covers per-source fetch outcomes, metric availability, cycle duration,
//! signal state and store size.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::domain::signals::SignalKind;
use crate::usecases::evaluator::EvaluationResult;

/// Centralized Prometheus metrics for the monitor.
///
/// All metrics follow the naming convention `altseason_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Source attempts by metric and outcome (`ok` or an error label).
    pub fetch_attempts: IntCounterVec,
    /// Metric availability in the last cycle (1 = available).
    pub metric_available: GaugeVec,
    /// Number of unavailable metrics in the last cycle.
    pub unavailable_metrics: IntGauge,
    /// Cycle duration histogram (seconds).
    pub cycle_duration_seconds: Histogram,
    /// Completed cycles.
    pub cycles_total: IntCounter,
    /// Cycles whose snapshot failed to persist.
    pub persist_failures: IntCounter,
    /// Active signal count in the last cycle.
    pub active_signals: IntGauge,
    /// Per-signal state in the last cycle (1 = active).
    pub signal_active: GaugeVec,
    /// Alert level ordinal (0 none .. 3 confirmed).
    pub alert_level: Gauge,
    /// Snapshots currently retained.
    pub snapshots_stored: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fetch_attempts = IntCounterVec::new(
            Opts::new("altseason_fetch_attempts_total", "Source attempts by outcome"),
            &["metric", "outcome"],
        )?;

        let metric_available = GaugeVec::new(
            Opts::new(
                "altseason_metric_available",
                "Whether the metric was available in the last cycle (1=yes, 0=no)",
            ),
            &["metric"],
        )?;

        let unavailable_metrics = IntGauge::new(
            "altseason_unavailable_metrics",
            "Metrics unavailable in the last cycle",
        )?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "altseason_cycle_duration_seconds",
                "Evaluation cycle duration in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 60.0, 120.0]),
        )?;

        let cycles_total = IntCounter::new(
            "altseason_cycles_total",
            "Completed evaluation cycles",
        )?;

        let persist_failures = IntCounter::new(
            "altseason_persist_failures_total",
            "Cycles whose snapshot was not persisted",
        )?;

        let active_signals = IntGauge::new(
            "altseason_active_signals",
            "Active signals in the last cycle",
        )?;

        let signal_active = GaugeVec::new(
            Opts::new(
                "altseason_signal_active",
                "Signal state in the last cycle (1=active, 0=inactive)",
            ),
            &["signal"],
        )?;

        let alert_level = Gauge::new(
            "altseason_alert_level",
            "Alert level (0=none, 1=early, 2=strong, 3=confirmed)",
        )?;

        let snapshots_stored = IntGauge::new(
            "altseason_snapshots_stored",
            "Snapshots retained in the store",
        )?;

        // Register all metrics
        registry.register(Box::new(fetch_attempts.clone()))?;
        registry.register(Box::new(metric_available.clone()))?;
        registry.register(Box::new(unavailable_metrics.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(persist_failures.clone()))?;
        registry.register(Box::new(active_signals.clone()))?;
        registry.register(Box::new(signal_active.clone()))?;
        registry.register(Box::new(alert_level.clone()))?;
        registry.register(Box::new(snapshots_stored.clone()))?;

        Ok(Self {
            registry,
            fetch_attempts,
            metric_available,
            unavailable_metrics,
            cycle_duration_seconds,
            cycles_total,
            persist_failures,
            active_signals,
            signal_active,
            alert_level,
            snapshots_stored,
        })
    }

    /// Record one completed cycle.
    pub fn observe_cycle(&self, result: &EvaluationResult) {
        for (metric, outcome) in &result.outcomes {
            for failure in &outcome.failures {
                self.fetch_attempts
                    .with_label_values(&[metric.as_str(), failure.error.label()])
                    .inc();
            }
            if outcome.winner.is_some() {
                self.fetch_attempts
                    .with_label_values(&[metric.as_str(), "ok"])
                    .inc();
            }
        }

        for (name, metric) in result.vector.iter() {
            let available = if metric.value.is_available() { 1.0 } else { 0.0 };
            self.metric_available.with_label_values(&[name]).set(available);
        }
        self.unavailable_metrics
            .set(result.vector.unavailable_names().len() as i64);

        self.cycle_duration_seconds
            .observe(result.duration.as_secs_f64());
        self.cycles_total.inc();
        if !result.persisted {
            self.persist_failures.inc();
        }

        self.active_signals.set(result.signals.active_count as i64);
        for kind in SignalKind::ALL {
            let label = kind.to_string();
            let on = if result.signals.is_active(kind) { 1.0 } else { 0.0 };
            self.signal_active
                .with_label_values(&[label.as_str()])
                .set(on);
        }
        self.alert_level.set(f64::from(result.level.ordinal()));
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
