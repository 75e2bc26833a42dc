//! Property-Based Tests - Domain Layer Invariants
//!
//! Uses `proptest` to verify that domain components maintain their
//! invariants across random inputs.

use proptest::prelude::*;

use altseason_monitor::domain::metric::{Metric, MetricKind, MetricVector};
use altseason_monitor::domain::signals::{evaluate, AlertLevel, SignalKind, SignalRules};
use altseason_monitor::domain::snapshot::{Snapshot, SnapshotHistory};
use altseason_monitor::domain::trend::{delta, TrendBand, TrendBands};

fn metric(kind: MetricKind, value: Option<f64>) -> Metric {
    match value {
        Some(v) => Metric::available(kind, v),
        None => Metric::unavailable(kind),
    }
}

/// Vector over the default signal metric names.
fn signal_vector(values: [Option<f64>; 5]) -> MetricVector {
    let names = [
        ("eth_btc_change_7d", MetricKind::PercentagePoint),
        ("funding_rate_avg", MetricKind::Percentage),
        ("stablecoin_netflow_cex", MetricKind::AbsoluteUsd),
        ("alt_btc_volume_ratio", MetricKind::Ratio),
        ("altcoin_season_index", MetricKind::Index0To100),
    ];
    let mut v = MetricVector::new();
    for ((name, kind), value) in names.into_iter().zip(values) {
        v.insert(name, metric(kind, value));
    }
    v
}

fn history(timestamps: &[i64], retention: i64) -> SnapshotHistory {
    let mut h = SnapshotHistory::new(retention);
    for (i, &ts) in timestamps.iter().enumerate() {
        let mut v = MetricVector::new();
        let value = if i % 3 == 2 { None } else { Some(i as f64) };
        v.insert("m", metric(MetricKind::Ratio, value));
        h.append(Snapshot::new(ts, v)).unwrap();
    }
    h
}

fn sorted_timestamps() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..1_000_000, 0..40).prop_map(|mut v| {
        v.sort_unstable();
        v
    })
}

// ── Signal Evaluation Properties ────────────────────────────

proptest! {
    /// The active count always equals the number of true signals.
    #[test]
    fn active_count_matches_signals(
        values in prop::array::uniform5(prop::option::of(-200.0f64..200.0)),
    ) {
        let report = evaluate(&signal_vector(values), &SignalRules::default());
        let on = SignalKind::ALL.iter().filter(|&&k| report.is_active(k)).count();
        prop_assert_eq!(report.active_count, on);
        prop_assert!(report.active_count <= 5);
    }

    /// An unavailable metric never activates its signal.
    #[test]
    fn unavailable_never_fires(
        values in prop::array::uniform5(prop::option::of(-200.0f64..200.0)),
    ) {
        let report = evaluate(&signal_vector(values), &SignalRules::default());
        for (kind, value) in SignalKind::ALL.iter().zip(values) {
            if value.is_none() {
                prop_assert!(!report.is_active(*kind));
            }
        }
    }

    /// Alert level never decreases as more signals fire.
    #[test]
    fn alert_level_monotonic_in_count(count in 0usize..5, season in any::<bool>()) {
        let lower = AlertLevel::classify(count, season);
        let higher = AlertLevel::classify(count + 1, season);
        prop_assert!(higher >= lower);
        prop_assert!(AlertLevel::classify(count, true) >= AlertLevel::classify(count, false));
    }
}

// ── Snapshot History Properties ─────────────────────────────

proptest! {
    /// Pruning twice at the same instant removes nothing the second time.
    #[test]
    fn prune_idempotent(
        timestamps in sorted_timestamps(),
        retention in 1i64..500_000,
        now in 0i64..1_500_000,
    ) {
        let mut h = history(&timestamps, retention);
        h.prune(now);
        let once = h.clone();
        prop_assert_eq!(h.prune(now), 0);
        prop_assert_eq!(h, once);
    }

    /// Nothing older than the horizon survives a prune.
    #[test]
    fn prune_respects_horizon(
        timestamps in sorted_timestamps(),
        retention in 1i64..500_000,
        now in 0i64..1_500_000,
    ) {
        let mut h = history(&timestamps, retention);
        h.prune(now);
        prop_assert!(h.snapshots().iter().all(|s| s.timestamp >= now - retention));
    }

    /// The nearest lookup matches a linear scan for the latest
    /// available value at or before the target.
    #[test]
    fn nearest_matches_linear_scan(
        timestamps in sorted_timestamps(),
        target in 0i64..1_000_000,
    ) {
        let h = history(&timestamps, i64::MAX / 2);
        let expected = h
            .snapshots()
            .iter()
            .filter(|s| s.timestamp <= target)
            .filter_map(|s| s.vector.value("m"))
            .last();
        prop_assert_eq!(h.nearest_at_or_before("m", target), expected);
    }
}

// ── Metric and Trend Properties ─────────────────────────────

proptest! {
    /// Non-finite values are rejected for every kind.
    #[test]
    fn coerce_rejects_non_finite(
        kind in prop::sample::select(vec![
            MetricKind::Percentage,
            MetricKind::PercentagePoint,
            MetricKind::Ratio,
            MetricKind::AbsoluteUsd,
            MetricKind::AbsoluteCount,
            MetricKind::Index0To100,
        ]),
        raw in prop::sample::select(vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY]),
    ) {
        prop_assert!(kind.coerce(raw).is_err());
    }

    /// Index values coerce exactly when they lie in [0, 100].
    #[test]
    fn index_domain(raw in -50.0f64..150.0) {
        let ok = MetricKind::Index0To100.coerce(raw).is_ok();
        prop_assert_eq!(ok, (0.0..=100.0).contains(&raw));
    }

    /// A relative delta against a zero baseline is never computed.
    #[test]
    fn relative_delta_needs_nonzero_baseline(current in -1e9f64..1e9) {
        prop_assert!(delta(MetricKind::Ratio, Some(current), Some(0.0)).is_none());
    }

    /// Mirrored bands are symmetric around zero.
    #[test]
    fn mirrored_bands_symmetric(d in 0.0f64..50.0) {
        let bands = TrendBands::RELATIVE;
        let pos = bands.classify(d);
        let neg = bands.classify(-d);
        let mirrored = match pos {
            TrendBand::StrongPositive => TrendBand::StrongNegative,
            TrendBand::Positive => TrendBand::Negative,
            TrendBand::MildPositive => TrendBand::MildNegative,
            other => other,
        };
        prop_assert_eq!(neg, mirrored);
    }
}
