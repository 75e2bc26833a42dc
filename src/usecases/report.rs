//! Report Assembler - Human-Readable Cycle Summary
//!
//! Turns an `EvaluationResult` into report lines. All wording lives
//! here and in config labels; the domain only produces numbers, bands
//! and levels.

use chrono::{DateTime, FixedOffset};

use super::evaluator::EvaluationResult;
use crate::config::{AppConfig, DisplayFormat, MetricConfig};
use crate::domain::signals::{AlertLevel, SignalKind};
use crate::domain::trend::{Delta, DeltaKind, Trend, TrendBand};

/// Assemble report lines for one cycle.
///
/// `local_time` is the cycle time in the configured display offset.
pub fn assemble(
  result: &EvaluationResult,
  config: &AppConfig,
  local_time: DateTime<FixedOffset>,
) -> Vec<String> {
  let mut lines = Vec::with_capacity(config.metrics.len() + 12);

  lines.push(format!(
    "{} - {} (UTC{})",
    config.bot.name,
    local_time.format("%Y-%m-%d %H:%M"),
    local_time.format("%:z")
  ));
  lines.push(String::new());

  for metric in &config.metrics {
    lines.push(metric_line(result, metric));
  }

  lines.push(String::new());
  lines.push(format!(
    "Signals active: {}/{}",
    result.signals.active_count,
    SignalKind::ALL.len()
  ));
  for kind in SignalKind::ALL {
    let rule = config.signals.rule(kind);
    let label = config
      .metric(&rule.metric)
      .map_or(rule.metric.as_str(), |m| m.label.as_str());
    let mark = if result.signals.is_active(kind) { "[x]" } else { "[ ]" };
    lines.push(format!("{mark} {label} > {}", rule.threshold));
  }

  if let Some(alert) = alert_line(result.level) {
    lines.push(String::new());
    lines.push(alert.to_string());
  }

  if !result.persisted {
    lines.push(String::new());
    lines.push("Note: snapshot not saved; trends may be missing next cycle".to_string());
  }

  lines
}

fn metric_line(result: &EvaluationResult, metric: &MetricConfig) -> String {
  let value = result
    .vector
    .value(&metric.name)
    .map_or_else(|| "N/A".to_string(), |v| format_value(v, metric.display_format()));

  let mut line = format!("{}: {value}", metric.label);
  for (window, deltas) in [("4h", &result.deltas_4h), ("24h", &result.deltas_24h)] {
    if let Some(trend) = deltas.get(&metric.name) {
      line.push_str(&format!(" | {window} {}", describe_trend(trend, metric)));
    }
  }
  line
}

fn describe_trend(trend: &Trend, metric: &MetricConfig) -> String {
  let word = match trend.band {
    TrendBand::StrongPositive => format!("strongly {}", metric.labels.rising),
    TrendBand::Positive => metric.labels.rising.clone(),
    TrendBand::MildPositive => format!("slightly {}", metric.labels.rising),
    TrendBand::Sideways => "flat".to_string(),
    TrendBand::MildNegative => format!("slightly {}", metric.labels.falling),
    TrendBand::Negative => metric.labels.falling.clone(),
    TrendBand::StrongNegative => format!("strongly {}", metric.labels.falling),
  };
  format!("{} {word}", format_delta(&trend.delta))
}

fn format_delta(delta: &Delta) -> String {
  match delta.kind {
    DeltaKind::RelativePercent => format!("{:+.2}%", delta.value),
    DeltaKind::PointDifference => format!("{:+.2} pts", delta.value),
  }
}

fn alert_line(level: AlertLevel) -> Option<&'static str> {
  match level {
    AlertLevel::Confirmed => Some("ALERT: Altseason Confirmed"),
    AlertLevel::StrongSignal => Some("ALERT: Strong Signal, most conditions active"),
    AlertLevel::EarlySignal => Some("ALERT: Early Signal, conditions forming"),
    AlertLevel::None => None,
  }
}

/// Render a value in the metric's display format.
pub fn format_value(value: f64, format: DisplayFormat) -> String {
  match format {
    DisplayFormat::Percent => format!("{value:.2}%"),
    DisplayFormat::SignedPercent => format!("{value:+.2}%"),
    DisplayFormat::Usd => format_usd(value),
    DisplayFormat::Decimal => format!("{value:.2}"),
    DisplayFormat::Rate => format!("{value:+.6}"),
    DisplayFormat::Integer => group_thousands(&format!("{value:.0}")),
  }
}

/// `$1,234.56` below one million, `$2,431,000,000` above.
pub fn format_usd(value: f64) -> String {
  let decimals = if value.abs() < 1e6 { 2 } else { 0 };
  let digits = format!("{:.*}", decimals, value.abs());
  let sign = if value < 0.0 && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
    "-"
  } else {
    ""
  };
  format!("{sign}${}", group_thousands(&digits))
}

/// Insert `,` separators into the integer part of a formatted number.
fn group_thousands(formatted: &str) -> String {
  let (sign, unsigned) = match formatted.strip_prefix('-') {
    Some(rest) => ("-", rest),
    None => ("", formatted),
  };
  let (int_part, frac_part) = match unsigned.split_once('.') {
    Some((i, f)) => (i, Some(f)),
    None => (unsigned, None),
  };

  let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
  for (i, c) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  match frac_part {
    Some(f) => format!("{sign}{grouped}.{f}"),
    None => format!("{sign}{grouped}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::time::Duration;

  use uuid::Uuid;

  use crate::config::TrendLabels;
  use crate::domain::metric::{Metric, MetricKind, MetricVector};
  use crate::domain::signals::{evaluate, SignalRules};

  fn altcap_metric() -> MetricConfig {
    MetricConfig {
      name: "altcoin_market_cap".into(),
      kind: MetricKind::AbsoluteUsd,
      label: "Altcoin Market Cap".into(),
      trend: None,
      display: None,
      labels: TrendLabels::default(),
      sources: Vec::new(),
    }
  }

  fn trend(value: f64, band: TrendBand) -> Trend {
    Trend {
      delta: Delta {
        kind: DeltaKind::RelativePercent,
        value,
      },
      band,
    }
  }

  fn result_with(
    deltas_4h: BTreeMap<String, Trend>,
    deltas_24h: BTreeMap<String, Trend>,
  ) -> EvaluationResult {
    let mut vector = MetricVector::new();
    vector.insert(
      "altcoin_market_cap",
      Metric::available(MetricKind::AbsoluteUsd, 1.2e12),
    );
    let signals = evaluate(&vector, &SignalRules::default());
    EvaluationResult {
      cycle_id: Uuid::nil(),
      timestamp: 0,
      level: signals.level,
      vector,
      deltas_4h,
      deltas_24h,
      signals,
      persisted: true,
      outcomes: BTreeMap::new(),
      duration: Duration::ZERO,
    }
  }

  #[test]
  fn test_metric_line_shows_both_windows() {
    let name = "altcoin_market_cap".to_string();
    let result = result_with(
      BTreeMap::from([(name.clone(), trend(0.8, TrendBand::MildPositive))]),
      BTreeMap::from([(name, trend(-6.0, TrendBand::Negative))]),
    );
    assert_eq!(
      metric_line(&result, &altcap_metric()),
      "Altcoin Market Cap: $1,200,000,000,000 | 4h +0.80% slightly rising | 24h -6.00% falling"
    );
  }

  #[test]
  fn test_metric_line_omits_missing_window() {
    let name = "altcoin_market_cap".to_string();
    let result = result_with(
      BTreeMap::from([(name, trend(2.5, TrendBand::Positive))]),
      BTreeMap::new(),
    );
    assert_eq!(
      metric_line(&result, &altcap_metric()),
      "Altcoin Market Cap: $1,200,000,000,000 | 4h +2.50% rising"
    );
    let bare = result_with(BTreeMap::new(), BTreeMap::new());
    assert_eq!(
      metric_line(&bare, &altcap_metric()),
      "Altcoin Market Cap: $1,200,000,000,000"
    );
  }

  #[test]
  fn test_usd_formatting() {
    assert_eq!(format_usd(1234.5), "$1,234.50");
    assert_eq!(format_usd(999_999.0), "$999,999.00");
    assert_eq!(format_usd(2_431_000_000.4), "$2,431,000,000");
    assert_eq!(format_usd(-1_500_000.0), "-$1,500,000");
    assert_eq!(format_usd(0.0), "$0.00");
  }

  #[test]
  fn test_value_formats() {
    assert_eq!(format_value(52.314, DisplayFormat::Percent), "52.31%");
    assert_eq!(format_value(3.5, DisplayFormat::SignedPercent), "+3.50%");
    assert_eq!(format_value(0.000125, DisplayFormat::Rate), "+0.000125");
    assert_eq!(format_value(1.825, DisplayFormat::Decimal), "1.82");
    assert_eq!(format_value(81.0, DisplayFormat::Integer), "81");
    assert_eq!(format_value(-12_345.0, DisplayFormat::Integer), "-12,345");
  }

  #[test]
  fn test_group_thousands() {
    assert_eq!(group_thousands("1"), "1");
    assert_eq!(group_thousands("1000"), "1,000");
    assert_eq!(group_thousands("123456.78"), "123,456.78");
  }

  #[test]
  fn test_delta_formatting() {
    let relative = Delta {
      kind: DeltaKind::RelativePercent,
      value: 10.0,
    };
    let point = Delta {
      kind: DeltaKind::PointDifference,
      value: -1.5,
    };
    assert_eq!(format_delta(&relative), "+10.00%");
    assert_eq!(format_delta(&point), "-1.50 pts");
  }
}
