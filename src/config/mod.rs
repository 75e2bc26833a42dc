//! Configuration Module - TOML-based Monitor Configuration
//!
//! Loads and validates configuration from `config.toml`. Retention,
//! comparison windows, band profiles, signal thresholds and every
//! metric's ordered source list are data here; nothing about them is
//! hardcoded in the domain or use-case layers.

pub mod hot_reload;
pub mod loader;
pub mod sources;

use serde::Deserialize;

use crate::domain::metric::MetricKind;
use crate::domain::signals::SignalRules;
use crate::domain::trend::TrendBands;

pub use sources::{JsonParser, RequestConfig, SourceConfig};

/// Top-level monitor configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the first evaluation cycle runs.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Monitor identity and logging.
  pub bot: BotConfig,
  /// Outbound HTTP behavior shared by every source.
  #[serde(default)]
  pub http: HttpConfig,
  /// Snapshot store location and retention.
  #[serde(default)]
  pub store: StoreConfig,
  /// Historical comparison windows.
  #[serde(default)]
  pub windows: WindowConfig,
  /// Trend band profiles.
  #[serde(default)]
  pub trend: TrendConfig,
  /// Signal metric bindings and thresholds.
  #[serde(default)]
  pub signals: SignalRules,
  /// Metric definitions with their ordered source attempts.
  pub metrics: Vec<MetricConfig>,
  /// Daily report schedule.
  #[serde(default)]
  pub schedule: ScheduleConfig,
  /// Health and metrics endpoints.
  #[serde(default)]
  pub server: ServerConfig,
}

impl AppConfig {
  /// Look up a metric definition by name.
  pub fn metric(&self, name: &str) -> Option<&MetricConfig> {
    self.metrics.iter().find(|m| m.name == name)
  }
}

/// Monitor identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable name, shown in the report header.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// Per-request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Maximum in-flight requests across all sources.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Request pacing across all sources.
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
  /// User-Agent header sent with every request.
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
  /// Environment variables holding API secrets usable in templates.
  #[serde(default)]
  pub credential_env: Vec<String>,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_timeout(),
      max_concurrent: default_max_concurrent(),
      requests_per_second: default_requests_per_second(),
      user_agent: default_user_agent(),
      credential_env: Vec::new(),
    }
  }
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Path of the persisted snapshot file.
  #[serde(default = "default_store_path")]
  pub path: String,
  /// Retention horizon in hours.
  #[serde(default = "default_retention_hours")]
  pub retention_hours: u64,
}

impl StoreConfig {
  pub fn retention_secs(&self) -> i64 {
    hours_to_secs(self.retention_hours)
  }
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path: default_store_path(),
      retention_hours: default_retention_hours(),
    }
  }
}

/// Comparison windows for deltas.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
  /// Short window in hours.
  #[serde(default = "default_short_window")]
  pub short_hours: u64,
  /// Long window in hours.
  #[serde(default = "default_long_window")]
  pub long_hours: u64,
}

impl WindowConfig {
  pub fn short_secs(&self) -> i64 {
    hours_to_secs(self.short_hours)
  }

  pub fn long_secs(&self) -> i64 {
    hours_to_secs(self.long_hours)
  }
}

impl Default for WindowConfig {
  fn default() -> Self {
    Self {
      short_hours: default_short_window(),
      long_hours: default_long_window(),
    }
  }
}

/// Band profile names a metric can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendProfile {
  Relative,
  Point,
  Season,
}

impl TrendProfile {
  /// Profile used when a metric does not name one.
  pub fn default_for(kind: MetricKind) -> Self {
    match kind {
      MetricKind::PercentagePoint => Self::Point,
      MetricKind::Index0To100 => Self::Season,
      _ => Self::Relative,
    }
  }
}

/// All band profiles.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendConfig {
  #[serde(default = "default_relative_bands")]
  pub relative: TrendBands,
  #[serde(default = "default_point_bands")]
  pub point: TrendBands,
  #[serde(default = "default_season_bands")]
  pub season: TrendBands,
}

impl TrendConfig {
  pub fn bands(&self, profile: TrendProfile) -> &TrendBands {
    match profile {
      TrendProfile::Relative => &self.relative,
      TrendProfile::Point => &self.point,
      TrendProfile::Season => &self.season,
    }
  }
}

impl Default for TrendConfig {
  fn default() -> Self {
    Self {
      relative: TrendBands::RELATIVE,
      point: TrendBands::POINT,
      season: TrendBands::SEASON,
    }
  }
}

/// How the report renders a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
  /// `52.31%`
  Percent,
  /// `+3.50%`
  SignedPercent,
  /// `$2,431,000,000`
  Usd,
  /// `1.82`
  Decimal,
  /// `+0.000125`
  Rate,
  /// `81`
  Integer,
}

impl DisplayFormat {
  pub fn default_for(kind: MetricKind) -> Self {
    match kind {
      MetricKind::Percentage => Self::SignedPercent,
      MetricKind::PercentagePoint => Self::Percent,
      MetricKind::Ratio => Self::Decimal,
      MetricKind::AbsoluteUsd => Self::Usd,
      MetricKind::AbsoluteCount | MetricKind::Index0To100 => Self::Integer,
    }
  }
}

/// Words the report uses for the two trend directions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrendLabels {
  pub rising: String,
  pub falling: String,
}

impl Default for TrendLabels {
  fn default() -> Self {
    Self {
      rising: "rising".to_string(),
      falling: "falling".to_string(),
    }
  }
}

/// One metric and its ordered fallback chain.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
  /// Unique key in the metric vector.
  pub name: String,
  /// Declared value kind.
  pub kind: MetricKind,
  /// Display label for reports.
  pub label: String,
  /// Band profile override.
  #[serde(default)]
  pub trend: Option<TrendProfile>,
  /// Display format override.
  #[serde(default)]
  pub display: Option<DisplayFormat>,
  /// Direction words for this metric.
  #[serde(default)]
  pub labels: TrendLabels,
  /// Source attempts, tried in order.
  pub sources: Vec<SourceConfig>,
}

impl MetricConfig {
  pub fn trend_profile(&self) -> TrendProfile {
    self.trend.unwrap_or_else(|| TrendProfile::default_for(self.kind))
  }

  pub fn display_format(&self) -> DisplayFormat {
    self
      .display
      .unwrap_or_else(|| DisplayFormat::default_for(self.kind))
  }
}

/// Daily schedule for the report job.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
  /// Local time of day, `HH:MM`.
  #[serde(default = "default_daily_at")]
  pub daily_at: String,
  /// Offset of the local time zone from UTC, in hours.
  #[serde(default = "default_utc_offset")]
  pub utc_offset_hours: i32,
  /// Run one cycle immediately at startup.
  #[serde(default = "default_true")]
  pub run_on_start: bool,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self {
      daily_at: default_daily_at(),
      utc_offset_hours: default_utc_offset(),
      run_on_start: true,
    }
  }
}

/// Health and metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Serve `/live`, `/ready` and `/metrics`.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Prometheus metrics bind address.
  #[serde(default = "default_metrics_addr")]
  pub metrics_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      metrics_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

fn hours_to_secs(hours: u64) -> i64 {
  i64::try_from(hours.saturating_mul(3600)).unwrap_or(i64::MAX)
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_timeout() -> u64 {
  25
}

fn default_max_concurrent() -> usize {
  8
}

fn default_requests_per_second() -> u32 {
  5
}

fn default_user_agent() -> String {
  format!("altseason-monitor/{}", env!("CARGO_PKG_VERSION"))
}

fn default_store_path() -> String {
  "data/snapshots.json".to_string()
}

fn default_retention_hours() -> u64 {
  72
}

fn default_short_window() -> u64 {
  4
}

fn default_long_window() -> u64 {
  24
}

fn default_relative_bands() -> TrendBands {
  TrendBands::RELATIVE
}

fn default_point_bands() -> TrendBands {
  TrendBands::POINT
}

fn default_season_bands() -> TrendBands {
  TrendBands::SEASON
}

fn default_daily_at() -> String {
  "07:00".to_string()
}

fn default_utc_offset() -> i32 {
  7
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
