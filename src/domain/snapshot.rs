//! Snapshot history: timestamped metric vectors under a retention horizon.
//!
//! Pure in-memory structure. Persistence lives behind the
//! `SnapshotRepository` port; the single-writer discipline lives in
//! `usecases::store`.

use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::metric::MetricVector;

/// A metric vector captured at one instant (epoch seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: i64,
    pub vector: MetricVector,
}

impl Snapshot {
    pub fn new(timestamp: i64, vector: MetricVector) -> Self {
        Self { timestamp, vector }
    }
}

/// Ordered, append-only sequence of snapshots.
///
/// Invariants:
/// - timestamps are non-decreasing in storage order
/// - stored snapshots are never mutated
/// - after `prune(now)`, no snapshot is older than `now - retention_secs`
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHistory {
    snapshots: Vec<Snapshot>,
    retention_secs: i64,
}

impl SnapshotHistory {
    /// Create an empty history with the given retention horizon.
    pub fn new(retention_secs: i64) -> Self {
        Self {
            snapshots: Vec::new(),
            retention_secs,
        }
    }

    /// Rebuild a history from persisted snapshots.
    ///
    /// Fails with `Corrupt` if the sequence is not in append order.
    pub fn from_snapshots(
        snapshots: Vec<Snapshot>,
        retention_secs: i64,
    ) -> Result<Self, StoreError> {
        if let Some(pair) = snapshots
            .windows(2)
            .find(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(StoreError::Corrupt(format!(
                "snapshot at {} follows later snapshot at {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }

        Ok(Self {
            snapshots,
            retention_secs,
        })
    }

    /// Append a snapshot at the end of the sequence.
    pub fn append(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        if let Some(latest) = self.latest_timestamp() {
            if snapshot.timestamp < latest {
                return Err(StoreError::OutOfOrder {
                    timestamp: snapshot.timestamp,
                    latest,
                });
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Change the retention horizon. Takes effect at the next `prune`.
    pub fn set_retention(&mut self, retention_secs: i64) {
        self.retention_secs = retention_secs;
    }

    /// Drop every snapshot older than `now - retention`.
    ///
    /// Returns the number removed. Idempotent for a fixed `now`.
    pub fn prune(&mut self, now: i64) -> usize {
        let cutoff = now.saturating_sub(self.retention_secs);
        let keep_from = self.snapshots.partition_point(|s| s.timestamp < cutoff);
        self.snapshots.drain(..keep_from);
        keep_from
    }

    /// Value of `metric` in the latest snapshot at or before `target_ts`
    /// in which that metric is available.
    pub fn nearest_at_or_before(&self, metric: &str, target_ts: i64) -> Option<f64> {
        let end = self.snapshots.partition_point(|s| s.timestamp <= target_ts);
        self.snapshots[..end]
            .iter()
            .rev()
            .find_map(|s| s.vector.value(metric))
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn latest_timestamp(&self) -> Option<i64> {
        self.snapshots.last().map(|s| s.timestamp)
    }

    pub fn retention_secs(&self) -> i64 {
        self.retention_secs
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::{Metric, MetricKind};

    const HOUR: i64 = 3600;

    fn vector_with(name: &str, value: Option<f64>) -> MetricVector {
        let mut v = MetricVector::new();
        let metric = match value {
            Some(x) => Metric::available(MetricKind::Ratio, x),
            None => Metric::unavailable(MetricKind::Ratio),
        };
        v.insert(name, metric);
        v
    }

    fn history(points: &[(i64, Option<f64>)]) -> SnapshotHistory {
        let mut h = SnapshotHistory::new(72 * HOUR);
        for (ts, value) in points {
            h.append(Snapshot::new(*ts, vector_with("ratio", *value))).unwrap();
        }
        h
    }

    #[test]
    fn test_append_rejects_out_of_order() {
        let mut h = history(&[(100, Some(1.0))]);
        let err = h.append(Snapshot::new(99, vector_with("ratio", Some(2.0))));
        assert!(matches!(err, Err(StoreError::OutOfOrder { timestamp: 99, latest: 100 })));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_append_accepts_equal_timestamp() {
        let mut h = history(&[(100, Some(1.0))]);
        assert!(h.append(Snapshot::new(100, vector_with("ratio", Some(2.0)))).is_ok());
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_nearest_picks_greatest_at_or_before() {
        let h = history(&[(10, Some(1.0)), (20, Some(2.0)), (30, Some(3.0))]);
        assert_eq!(h.nearest_at_or_before("ratio", 25), Some(2.0));
        assert_eq!(h.nearest_at_or_before("ratio", 30), Some(3.0));
        assert_eq!(h.nearest_at_or_before("ratio", 1_000), Some(3.0));
        assert_eq!(h.nearest_at_or_before("ratio", 9), None);
    }

    #[test]
    fn test_nearest_skips_unavailable() {
        let h = history(&[(10, Some(1.0)), (20, None), (30, None)]);
        assert_eq!(h.nearest_at_or_before("ratio", 30), Some(1.0));
    }

    #[test]
    fn test_nearest_unknown_metric() {
        let h = history(&[(10, Some(1.0))]);
        assert_eq!(h.nearest_at_or_before("other", 10), None);
    }

    #[test]
    fn test_prune_removes_outside_retention() {
        let now = 100 * HOUR;
        let mut h = history(&[
            (now - 80 * HOUR, Some(1.0)),
            (now - 72 * HOUR, Some(2.0)),
            (now - HOUR, Some(3.0)),
        ]);
        assert_eq!(h.prune(now), 1);
        assert!(h.snapshots().iter().all(|s| s.timestamp >= now - 72 * HOUR));
        assert_eq!(h.nearest_at_or_before("ratio", now - 75 * HOUR), None);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let now = 200 * HOUR;
        let mut h = history(&[(0, Some(1.0)), (now - HOUR, Some(2.0))]);
        h.prune(now);
        let once = h.clone();
        assert_eq!(h.prune(now), 0);
        assert_eq!(h, once);
    }

    #[test]
    fn test_from_snapshots_detects_disorder() {
        let snapshots = vec![
            Snapshot::new(20, MetricVector::new()),
            Snapshot::new(10, MetricVector::new()),
        ];
        assert!(matches!(
            SnapshotHistory::from_snapshots(snapshots, HOUR),
            Err(StoreError::Corrupt(_))
        ));
    }
}
