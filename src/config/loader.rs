//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use tracing::info;

use super::{AppConfig, JsonParser, SourceConfig, TrendProfile};
use crate::domain::signals::SignalKind;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    metrics = config.metrics.len(),
    retention_hours = config.store.retention_hours,
    short_window_hours = config.windows.short_hours,
    long_window_hours = config.windows.long_hours,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Unique metric names, each with at least one source
/// - Derived inputs that exist, match the operation arity and form no cycle
/// - Signal rules bound to configured metrics
/// - Positive windows, retention and timeouts
/// - Well-formed band profiles and schedule
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.metrics.is_empty(),
    "At least one metric must be configured"
  );

  let mut names = BTreeSet::new();
  for metric in &config.metrics {
    anyhow::ensure!(!metric.name.is_empty(), "Metric with empty name");
    anyhow::ensure!(
      names.insert(metric.name.as_str()),
      "Duplicate metric name: {}",
      metric.name
    );
    anyhow::ensure!(
      !metric.sources.is_empty(),
      "Metric {} has no sources configured",
      metric.name
    );
  }

  for metric in &config.metrics {
    for (i, source) in metric.sources.iter().enumerate() {
      validate_source(&metric.name, i, source, &names)?;
    }
  }

  ensure_acyclic(config)?;

  for kind in SignalKind::ALL {
    let rule = config.signals.rule(kind);
    anyhow::ensure!(
      names.contains(rule.metric.as_str()),
      "Signal {} references unknown metric {}",
      kind,
      rule.metric
    );
    anyhow::ensure!(
      rule.threshold.is_finite(),
      "Signal {} threshold must be finite",
      kind
    );
  }

  // Windows and retention
  anyhow::ensure!(
    config.windows.short_hours > 0 && config.windows.long_hours > 0,
    "Comparison windows must be positive"
  );
  anyhow::ensure!(
    config.store.retention_hours > 0,
    "retention_hours must be positive"
  );
  anyhow::ensure!(
    config.windows.long_hours <= config.store.retention_hours,
    "long window ({}h) exceeds retention ({}h); it would never find history",
    config.windows.long_hours,
    config.store.retention_hours
  );
  anyhow::ensure!(!config.store.path.is_empty(), "store.path must not be empty");

  for profile in [TrendProfile::Relative, TrendProfile::Point, TrendProfile::Season] {
    config
      .trend
      .bands(profile)
      .validate()
      .map_err(|e| anyhow::anyhow!("Invalid {profile:?} trend bands: {e}"))?;
  }

  // HTTP
  anyhow::ensure!(
    config.http.timeout_seconds > 0,
    "http.timeout_seconds must be positive"
  );
  anyhow::ensure!(
    config.http.max_concurrent > 0,
    "http.max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.http.requests_per_second > 0,
    "http.requests_per_second must be positive"
  );

  // Schedule
  NaiveTime::parse_from_str(&config.schedule.daily_at, "%H:%M").with_context(|| {
    format!(
      "schedule.daily_at must be HH:MM, got {}",
      config.schedule.daily_at
    )
  })?;
  anyhow::ensure!(
    (-12..=14).contains(&config.schedule.utc_offset_hours),
    "schedule.utc_offset_hours must be in [-12, 14], got {}",
    config.schedule.utc_offset_hours
  );

  Ok(())
}

fn validate_source(
  metric: &str,
  index: usize,
  source: &SourceConfig,
  names: &BTreeSet<&str>,
) -> Result<()> {
  if let Some(request) = source.request() {
    anyhow::ensure!(
      request.url.starts_with("http://") || request.url.starts_with("https://"),
      "Metric {} source {} has invalid URL: {}",
      metric,
      index,
      request.url
    );
  }

  match source {
    SourceConfig::Derived { op, inputs } => {
      anyhow::ensure!(
        inputs.len() == op.arity(),
        "Metric {} source {}: {:?} takes {} inputs, got {}",
        metric,
        index,
        op,
        op.arity(),
        inputs.len()
      );
      for input in inputs {
        anyhow::ensure!(
          names.contains(input.as_str()),
          "Metric {} source {} depends on unknown metric {}",
          metric,
          index,
          input
        );
        anyhow::ensure!(
          input != metric,
          "Metric {} source {} depends on itself",
          metric,
          index
        );
      }
    }
    SourceConfig::Api { pages, parser, .. } => {
      anyhow::ensure!(
        pages.is_none_or(|p| p > 0),
        "Metric {} source {}: pages must be positive",
        metric,
        index
      );
      anyhow::ensure!(
        pages.is_none() || *parser == JsonParser::CoingeckoVolumeRatio,
        "Metric {} source {}: only coingecko_volume_ratio accumulates pages",
        metric,
        index
      );
    }
    SourceConfig::Csv { column, .. } => {
      anyhow::ensure!(
        !column.is_empty(),
        "Metric {} source {}: csv column must not be empty",
        metric,
        index
      );
    }
    SourceConfig::Scrape {
      anchor,
      min_magnitude,
      max_magnitude,
      window,
      ..
    } => {
      anyhow::ensure!(
        !anchor.is_empty() && *window > 0,
        "Metric {} source {}: scrape needs an anchor and a positive window",
        metric,
        index
      );
      anyhow::ensure!(
        max_magnitude.is_none_or(|max| max >= *min_magnitude),
        "Metric {} source {}: max_magnitude below min_magnitude",
        metric,
        index
      );
    }
  }

  Ok(())
}

/// Reject dependency cycles among derived attempts.
fn ensure_acyclic(config: &AppConfig) -> Result<()> {
  let edges: BTreeMap<&str, Vec<&str>> = config
    .metrics
    .iter()
    .map(|m| {
      let deps = m
        .sources
        .iter()
        .flat_map(|s| s.dependencies())
        .map(String::as_str)
        .collect();
      (m.name.as_str(), deps)
    })
    .collect();

  // Kahn's algorithm: whatever cannot be emitted sits on a cycle.
  let mut remaining: BTreeMap<&str, usize> =
    edges.iter().map(|(name, deps)| (*name, deps.len())).collect();
  let mut ready: Vec<&str> = remaining
    .iter()
    .filter(|(_, n)| **n == 0)
    .map(|(name, _)| *name)
    .collect();

  while let Some(done) = ready.pop() {
    remaining.remove(done);
    for (name, deps) in &edges {
      if let Some(count) = remaining.get_mut(name) {
        let hits = deps.iter().filter(|d| **d == done).count();
        if hits > 0 {
          *count -= hits;
          if *count == 0 {
            ready.push(*name);
          }
        }
      }
    }
  }

  anyhow::ensure!(
    remaining.is_empty(),
    "Derived metrics form a dependency cycle: {}",
    remaining.keys().copied().collect::<Vec<_>>().join(", ")
  );

  Ok(())
}
