//! Arithmetic for metrics derived from other metrics of the same cycle.

use serde::{Deserialize, Serialize};

use super::error::FetchError;

/// Binary operation over two input metrics, in declared input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedOp {
    /// `a / b`
    Ratio,
    /// `a - b`
    Difference,
    /// `a + b`
    Sum,
    /// `total * (1 - share_pct / 100)`, floored at zero.
    ///
    /// Total market cap minus the BTC share gives the altcoin cap.
    ShareRemainder,
}

impl DerivedOp {
    /// Number of inputs the operation takes.
    pub const fn arity(self) -> usize {
        2
    }

    pub fn apply(self, inputs: &[f64]) -> Result<f64, FetchError> {
        let &[a, b] = inputs else {
            return Err(FetchError::UnparseableValue(format!(
                "{self:?} expects {} inputs, got {}",
                self.arity(),
                inputs.len()
            )));
        };
        if !a.is_finite() || !b.is_finite() {
            return Err(FetchError::UnparseableValue(format!(
                "{self:?} input is not finite: [{a}, {b}]"
            )));
        }

        let value = match self {
            Self::Ratio => {
                if b == 0.0 {
                    return Err(FetchError::UnparseableValue(
                        "ratio denominator is zero".into(),
                    ));
                }
                a / b
            }
            Self::Difference => a - b,
            Self::Sum => a + b,
            Self::ShareRemainder => (a * (1.0 - b / 100.0)).max(0.0),
        };

        if !value.is_finite() {
            return Err(FetchError::UnparseableValue(format!(
                "{self:?} produced a non-finite value"
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_remainder_altcap() {
        let altcap = DerivedOp::ShareRemainder.apply(&[2_000.0, 55.0]).unwrap();
        assert!((altcap - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_is_rejected() {
        assert!(DerivedOp::Sum.apply(&[f64::MAX, f64::MAX]).is_err());
        assert!(DerivedOp::Ratio.apply(&[f64::MAX, 1e-300]).is_err());
        assert!(DerivedOp::ShareRemainder.apply(&[f64::NAN, 50.0]).is_err());
        assert!(DerivedOp::Difference.apply(&[f64::INFINITY, 1.0]).is_err());
    }

    #[test]
    fn test_share_remainder_floors_at_zero() {
        assert_eq!(DerivedOp::ShareRemainder.apply(&[100.0, 120.0]), Ok(0.0));
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert!(DerivedOp::Ratio.apply(&[1.0, 0.0]).is_err());
        assert_eq!(DerivedOp::Ratio.apply(&[3.0, 2.0]), Ok(1.5));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(DerivedOp::Sum.apply(&[1.0]).is_err());
        assert!(DerivedOp::Difference.apply(&[1.0, 2.0, 3.0]).is_err());
    }
}
