//! Evaluation Benchmarks - Per-Cycle Domain Work
//!
//! Benchmarks the pure functions every cycle runs: history lookups at
//! both windows, trend banding and signal evaluation.
//!
//! Run with: cargo bench --bench signal_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use altseason_monitor::adapters::sources::parsers::{parse_number_token, scrape_number, ScrapePattern};
use altseason_monitor::domain::metric::{Metric, MetricKind, MetricVector};
use altseason_monitor::domain::signals::{evaluate, SignalRules};
use altseason_monitor::domain::snapshot::{Snapshot, SnapshotHistory};
use altseason_monitor::domain::trend::{Trend, TrendBands};

fn vector(seed: f64) -> MetricVector {
    let mut v = MetricVector::new();
    v.insert("eth_btc_change_7d", Metric::available(MetricKind::PercentagePoint, 2.0 + seed));
    v.insert("funding_rate_avg", Metric::available(MetricKind::Percentage, 0.01));
    v.insert("stablecoin_netflow_cex", Metric::available(MetricKind::AbsoluteUsd, 1.5e6));
    v.insert("alt_btc_volume_ratio", Metric::available(MetricKind::Ratio, 1.4 + seed / 10.0));
    v.insert("altcoin_season_index", Metric::available(MetricKind::Index0To100, 70.0));
    v
}

/// Three days of hourly snapshots, the default retention.
fn full_history() -> SnapshotHistory {
    let mut history = SnapshotHistory::new(72 * 3600);
    for hour in 0..72 {
        let snapshot = Snapshot::new(hour * 3600, vector(hour as f64 / 72.0));
        history.append(snapshot).expect("timestamps ascend");
    }
    history
}

/// Benchmark signal evaluation over a full vector.
fn bench_evaluate(c: &mut Criterion) {
    let v = vector(1.5);
    let rules = SignalRules::default();

    c.bench_function("evaluate_signals", |b| {
        b.iter(|| evaluate(black_box(&v), black_box(&rules)));
    });
}

/// Benchmark both window lookups plus banding for one metric.
fn bench_window_trends(c: &mut Criterion) {
    let history = full_history();
    let now = 72 * 3600;

    c.bench_function("window_trends", |b| {
        b.iter(|| {
            for window in [4 * 3600, 24 * 3600] {
                let past = history.nearest_at_or_before("alt_btc_volume_ratio", black_box(now - window));
                let _trend = Trend::compute(MetricKind::Ratio, &TrendBands::RELATIVE, Some(1.6), past);
            }
        });
    });
}

/// Benchmark the scrape fallback on a page-sized body.
fn bench_scrape(c: &mut Criterion) {
    let mut body = "<div class=\"nav\">Home | Charts | 3 items</div>".repeat(200);
    body.push_str("<h2>Altcoin Season Index</h2><span class=\"value\">81</span>");
    let pattern = ScrapePattern {
        anchor: "Altcoin Season Index",
        window: 200,
        min_magnitude: 10.0,
        max_magnitude: Some(100.0),
    };

    c.bench_function("scrape_season_index", |b| {
        b.iter(|| scrape_number(black_box(&body), &pattern));
    });

    c.bench_function("parse_number_token", |b| {
        b.iter(|| parse_number_token(black_box("$2.43T")));
    });
}

criterion_group!(benches, bench_evaluate, bench_window_trends, bench_scrape);
criterion_main!(benches);
