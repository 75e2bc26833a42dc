//! Delta and trend classification against historical values.
//!
//! The calculator only produces numbers and bands. Turning a band into
//! text ("inflow", "weakening", ...) is the report's job.

use serde::{Deserialize, Serialize};

use super::metric::MetricKind;

/// How a delta was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    /// `(current - historical) / historical * 100`.
    RelativePercent,
    /// `current - historical`.
    PointDifference,
}

/// Change between a current and a historical value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub kind: DeltaKind,
    pub value: f64,
}

/// Compute the delta for a metric of `kind`.
///
/// Relative changes divide by the magnitude of the historical value, so a
/// rise from a negative baseline stays positive.
///
/// Returns `None` if either side is missing, if the historical value is
/// zero for a relative change, or if the result is not finite.
pub fn delta(kind: MetricKind, current: Option<f64>, historical: Option<f64>) -> Option<Delta> {
    let (current, historical) = (current?, historical?);

    let (delta_kind, value) = if kind.is_relative() {
        if historical == 0.0 {
            return None;
        }
        (
            DeltaKind::RelativePercent,
            (current - historical) / historical.abs() * 100.0,
        )
    } else {
        (DeltaKind::PointDifference, current - historical)
    };

    value.is_finite().then_some(Delta {
        kind: delta_kind,
        value,
    })
}

/// Qualitative band of a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBand {
    StrongNegative,
    Negative,
    MildNegative,
    Sideways,
    MildPositive,
    Positive,
    StrongPositive,
}

impl TrendBand {
    pub fn is_positive(self) -> bool {
        self > Self::Sideways
    }

    pub fn is_negative(self) -> bool {
        self < Self::Sideways
    }
}

/// Shape of the negative half of a band profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeBranch {
    /// Negative thresholds mirror the positive ones.
    #[default]
    Mirrored,
    /// Any negative delta is a single `Negative` band.
    Collapsed,
}

/// Threshold profile used to band a delta.
///
/// With a single threshold configured, crossing it is the strongest band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendBands {
    #[serde(default)]
    pub strong: Option<f64>,
    #[serde(default)]
    pub mild: Option<f64>,
    #[serde(default)]
    pub negative: NegativeBranch,
}

impl TrendBands {
    /// Relative percent changes: 10 / 3, mirrored.
    pub const RELATIVE: Self = Self {
        strong: Some(10.0),
        mild: Some(3.0),
        negative: NegativeBranch::Mirrored,
    };

    /// General point differences: single threshold 1.0, mirrored.
    pub const POINT: Self = Self {
        strong: Some(1.0),
        mild: None,
        negative: NegativeBranch::Mirrored,
    };

    /// Season index point differences: 15 / 5, collapsed negative branch.
    pub const SEASON: Self = Self {
        strong: Some(15.0),
        mild: Some(5.0),
        negative: NegativeBranch::Collapsed,
    };

    /// Check the thresholds are ordered and usable.
    pub fn validate(&self) -> Result<(), String> {
        let (strong, mild) = match (self.strong, self.mild) {
            (None, None) => return Err("band profile needs at least one threshold".into()),
            (Some(s), None) | (None, Some(s)) => (s, None),
            (Some(s), Some(m)) => (s, Some(m)),
        };

        for t in std::iter::once(strong).chain(mild) {
            if !t.is_finite() || t <= 0.0 {
                return Err(format!("band threshold must be finite and positive, got {t}"));
            }
        }

        if let Some(m) = mild {
            if strong <= m {
                return Err(format!("strong threshold {strong} must exceed mild threshold {m}"));
            }
        }

        Ok(())
    }

    /// Band a delta value.
    pub fn classify(&self, delta: f64) -> TrendBand {
        // A lone threshold is the strong one, whichever field carries it.
        let (strong, mild) = match (self.strong, self.mild) {
            (None, m) => (m, None),
            pair => pair,
        };
        let magnitude = delta.abs();
        let reaches = |t: Option<f64>| t.is_some_and(|t| magnitude >= t);

        if delta > 0.0 {
            if reaches(strong) {
                TrendBand::StrongPositive
            } else if reaches(mild) {
                TrendBand::Positive
            } else {
                TrendBand::MildPositive
            }
        } else if delta < 0.0 {
            match self.negative {
                NegativeBranch::Collapsed => TrendBand::Negative,
                NegativeBranch::Mirrored if reaches(strong) => TrendBand::StrongNegative,
                NegativeBranch::Mirrored if reaches(mild) => TrendBand::Negative,
                NegativeBranch::Mirrored => TrendBand::MildNegative,
            }
        } else {
            TrendBand::Sideways
        }
    }
}

/// A delta together with its band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub delta: Delta,
    pub band: TrendBand,
}

impl Trend {
    /// Compute delta and band in one step.
    pub fn compute(
        kind: MetricKind,
        bands: &TrendBands,
        current: Option<f64>,
        historical: Option<f64>,
    ) -> Option<Self> {
        let delta = delta(kind, current, historical)?;
        Some(Self {
            delta,
            band: bands.classify(delta.value),
        })
    }
}
