//! Metric model: kinds, values and the per-cycle metric vector.
//!
//! `Unavailable` is an ordinary value here, not an error. It is what a
//! metric holds when every configured source attempt failed during a
//! cycle, and every downstream consumer has defined behavior for it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::FetchError;

/// Declared value kind of a metric.
///
/// The kind decides the numeric domain a fetched value must fall in
/// and how deltas against history are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// A percentage quantity compared by relative change.
    #[serde(rename = "percentage")]
    Percentage,
    /// A quantity already expressed in percent, compared by point difference.
    #[serde(rename = "percentage_point")]
    PercentagePoint,
    /// A non-negative ratio.
    #[serde(rename = "ratio")]
    Ratio,
    /// A USD amount. Signed, so flows can go either way.
    #[serde(rename = "absolute_usd")]
    AbsoluteUsd,
    /// A non-negative count.
    #[serde(rename = "absolute_count")]
    AbsoluteCount,
    /// A bounded index in [0, 100].
    #[serde(rename = "index_0_to_100")]
    Index0To100,
}

impl MetricKind {
    /// Validate a raw number against this kind's domain.
    ///
    /// Rejects NaN and infinities for every kind.
    pub fn coerce(self, raw: f64) -> Result<f64, FetchError> {
        if !raw.is_finite() {
            return Err(FetchError::UnparseableValue(format!(
                "non-finite value {raw}"
            )));
        }

        let in_domain = match self {
            Self::Percentage | Self::PercentagePoint | Self::AbsoluteUsd => true,
            Self::Ratio | Self::AbsoluteCount => raw >= 0.0,
            Self::Index0To100 => (0.0..=100.0).contains(&raw),
        };

        if in_domain {
            Ok(raw)
        } else {
            Err(FetchError::OutOfDomain {
                value: raw,
                kind: self.to_string(),
            })
        }
    }

    /// Whether deltas for this kind are relative percent changes.
    pub fn is_relative(self) -> bool {
        matches!(
            self,
            Self::Percentage | Self::Ratio | Self::AbsoluteUsd | Self::AbsoluteCount
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Percentage => "percentage",
            Self::PercentagePoint => "percentage_point",
            Self::Ratio => "ratio",
            Self::AbsoluteUsd => "absolute_usd",
            Self::AbsoluteCount => "absolute_count",
            Self::Index0To100 => "index_0_to_100",
        };
        f.write_str(s)
    }
}

/// A metric's value in one cycle.
///
/// Serializes as a JSON number, or `null` when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum MetricValue {
    Available(f64),
    Unavailable,
}

impl MetricValue {
    pub fn as_option(self) -> Option<f64> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        // Non-finite numbers never survive a round trip as "available".
        match value {
            Some(v) if v.is_finite() => Self::Available(v),
            _ => Self::Unavailable,
        }
    }
}

impl From<MetricValue> for Option<f64> {
    fn from(value: MetricValue) -> Self {
        value.as_option()
    }
}

/// One typed quantity. The owning vector's key is its name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: MetricValue,
}

impl Metric {
    pub fn available(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value: MetricValue::Available(value),
        }
    }

    pub fn unavailable(kind: MetricKind) -> Self {
        Self {
            kind,
            value: MetricValue::Unavailable,
        }
    }
}

/// All metrics captured in one evaluation cycle, keyed by name.
///
/// Ordered by name so reports, logs and persisted files are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricVector {
    metrics: BTreeMap<String, Metric>,
}

impl MetricVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a metric.
    pub fn insert(&mut self, name: impl Into<String>, metric: Metric) {
        self.metrics.insert(name.into(), metric);
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// The metric's value if present and available.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(|m| m.value.as_option())
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Names of metrics that ended the cycle unavailable.
    pub fn unavailable_names(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .filter(|(_, m)| !m.value.is_available())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl FromIterator<(String, Metric)> for MetricVector {
    fn from_iter<I: IntoIterator<Item = (String, Metric)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}
