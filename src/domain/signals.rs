//! Threshold signals and the altseason alert level.
//!
//! Signals read the current value of one metric each, never a delta.
//! An unavailable metric never activates its signal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::metric::MetricVector;

/// The five fixed signals, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Cross-asset 7d relative change (ETH/BTC).
    Momentum,
    /// Average perpetual funding rate.
    Funding,
    /// Exchange stablecoin netflow.
    Netflow,
    /// Alt/BTC spot volume ratio.
    VolumeRatio,
    /// Altcoin season index. Distinguishes Confirmed from StrongSignal.
    SeasonIndex,
}

impl SignalKind {
    pub const ALL: [Self; 5] = [
        Self::Momentum,
        Self::Funding,
        Self::Netflow,
        Self::VolumeRatio,
        Self::SeasonIndex,
    ];
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Momentum => "momentum",
            Self::Funding => "funding",
            Self::Netflow => "netflow",
            Self::VolumeRatio => "volume_ratio",
            Self::SeasonIndex => "season_index",
        };
        f.write_str(s)
    }
}

/// One signal's source metric and strict `>` threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRule {
    pub metric: String,
    pub threshold: f64,
}

impl SignalRule {
    pub fn new(metric: impl Into<String>, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            threshold,
        }
    }

    /// Whether the rule fires for the given vector.
    pub fn is_active(&self, vector: &MetricVector) -> bool {
        vector
            .value(&self.metric)
            .is_some_and(|v| v > self.threshold)
    }
}

/// Rules for all five signals. Omitted rules keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRules {
    pub momentum: SignalRule,
    pub funding: SignalRule,
    pub netflow: SignalRule,
    pub volume_ratio: SignalRule,
    pub season_index: SignalRule,
}

impl SignalRules {
    pub fn rule(&self, kind: SignalKind) -> &SignalRule {
        match kind {
            SignalKind::Momentum => &self.momentum,
            SignalKind::Funding => &self.funding,
            SignalKind::Netflow => &self.netflow,
            SignalKind::VolumeRatio => &self.volume_ratio,
            SignalKind::SeasonIndex => &self.season_index,
        }
    }
}

impl Default for SignalRules {
    fn default() -> Self {
        Self {
            momentum: SignalRule::new("eth_btc_change_7d", 3.0),
            funding: SignalRule::new("funding_rate_avg", 0.0),
            netflow: SignalRule::new("stablecoin_netflow_cex", 0.0),
            volume_ratio: SignalRule::new("alt_btc_volume_ratio", 1.5),
            season_index: SignalRule::new("altcoin_season_index", 75.0),
        }
    }
}

/// Ordinal alert level derived from active signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    None,
    EarlySignal,
    StrongSignal,
    Confirmed,
}

impl AlertLevel {
    /// Classify from the active count and the season-index signal.
    pub fn classify(active_count: usize, season_index_active: bool) -> Self {
        match active_count {
            n if n >= 4 && season_index_active => Self::Confirmed,
            n if n >= 4 => Self::StrongSignal,
            2 | 3 => Self::EarlySignal,
            _ => Self::None,
        }
    }

    /// Numeric encoding for gauges.
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::EarlySignal => "early_signal",
            Self::StrongSignal => "strong_signal",
            Self::Confirmed => "confirmed",
        };
        f.write_str(s)
    }
}

/// Output of the signal evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signals: BTreeMap<SignalKind, bool>,
    pub active_count: usize,
    pub level: AlertLevel,
}

impl SignalReport {
    pub fn is_active(&self, kind: SignalKind) -> bool {
        self.signals.get(&kind).copied().unwrap_or(false)
    }
}

/// Evaluate all signals against the current vector. Pure and total.
pub fn evaluate(vector: &MetricVector, rules: &SignalRules) -> SignalReport {
    let signals: BTreeMap<SignalKind, bool> = SignalKind::ALL
        .iter()
        .map(|&kind| (kind, rules.rule(kind).is_active(vector)))
        .collect();

    let active_count = signals.values().filter(|&&on| on).count();
    let season = signals
        .get(&SignalKind::SeasonIndex)
        .copied()
        .unwrap_or(false);

    SignalReport {
        level: AlertLevel::classify(active_count, season),
        signals,
        active_count,
    }
}
