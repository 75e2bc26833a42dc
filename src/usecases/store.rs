//! Snapshot Store - In-Memory History Backed by a Repository
//!
//! Owns the `SnapshotHistory` and the single write path:
//! append, prune, persist. Loading is never fatal; a missing or corrupt
//! file starts an empty history.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::error::StoreError;
use crate::domain::snapshot::{Snapshot, SnapshotHistory};
use crate::ports::repository::SnapshotRepository;

pub struct SnapshotStore {
  history: SnapshotHistory,
  repo: Arc<dyn SnapshotRepository>,
}

impl SnapshotStore {
  /// An empty store that persists through `repo`.
  pub fn empty(repo: Arc<dyn SnapshotRepository>, retention_secs: i64) -> Self {
    Self {
      history: SnapshotHistory::new(retention_secs),
      repo,
    }
  }

  /// Load persisted history, then prune it against `now`.
  #[instrument(skip(repo))]
  pub async fn open(repo: Arc<dyn SnapshotRepository>, retention_secs: i64, now: i64) -> Self {
    let history = match repo.load().await {
      Ok(Some(snapshots)) => match SnapshotHistory::from_snapshots(snapshots, retention_secs) {
        Ok(history) => history,
        Err(e) => {
          warn!(error = %e, "Snapshot history out of order, starting empty");
          SnapshotHistory::new(retention_secs)
        }
      },
      Ok(None) => SnapshotHistory::new(retention_secs),
      Err(e @ StoreError::Corrupt(_)) => {
        warn!(error = %e, "Snapshot store corrupt, starting empty");
        SnapshotHistory::new(retention_secs)
      }
      Err(e) => {
        warn!(error = %e, "Snapshot store unreadable, starting empty");
        SnapshotHistory::new(retention_secs)
      }
    };

    let mut store = Self { history, repo };
    let pruned = store.prune(now);
    info!(
      snapshots = store.history.len(),
      pruned, "Snapshot store opened"
    );
    store
  }

  pub fn history(&self) -> &SnapshotHistory {
    &self.history
  }

  pub fn len(&self) -> usize {
    self.history.len()
  }

  pub fn is_empty(&self) -> bool {
    self.history.is_empty()
  }

  /// Drop snapshots older than the retention horizon.
  pub fn prune(&mut self, now: i64) -> usize {
    self.history.prune(now)
  }

  pub fn nearest_at_or_before(&self, metric: &str, target_ts: i64) -> Option<f64> {
    self.history.nearest_at_or_before(metric, target_ts)
  }

  /// Append, prune and persist.
  ///
  /// The in-memory history keeps the snapshot even if persisting fails;
  /// the next successful save writes it out.
  #[instrument(skip(self, snapshot), fields(timestamp = snapshot.timestamp))]
  pub async fn append(&mut self, snapshot: Snapshot, now: i64) -> Result<(), StoreError> {
    self.history.append(snapshot)?;
    self.history.prune(now);

    self.repo.save(self.history.snapshots()).await
  }

  /// Apply a new retention horizon and prune against `now`.
  pub fn set_retention(&mut self, retention_secs: i64, now: i64) -> usize {
    self.history.set_retention(retention_secs);
    self.history.prune(now)
  }

  pub async fn is_healthy(&self) -> bool {
    self.repo.is_healthy().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use async_trait::async_trait;

  use crate::domain::metric::{Metric, MetricKind, MetricVector};

  #[derive(Default)]
  struct MemoryRepo {
    stored: Mutex<Option<Vec<Snapshot>>>,
    corrupt: bool,
    fail_save: bool,
  }

  #[async_trait]
  impl SnapshotRepository for MemoryRepo {
    async fn load(&self) -> Result<Option<Vec<Snapshot>>, StoreError> {
      if self.corrupt {
        return Err(StoreError::Corrupt("bad".into()));
      }
      Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, snapshots: &[Snapshot]) -> Result<(), StoreError> {
      if self.fail_save {
        return Err(StoreError::Io(std::io::Error::other("disk full")));
      }
      *self.stored.lock().unwrap() = Some(snapshots.to_vec());
      Ok(())
    }

    async fn is_healthy(&self) -> bool {
      !self.fail_save
    }
  }

  fn snapshot(ts: i64, value: f64) -> Snapshot {
    let mut v = MetricVector::new();
    v.insert("m", Metric::available(MetricKind::Ratio, value));
    Snapshot::new(ts, v)
  }

  #[tokio::test]
  async fn test_corrupt_store_starts_empty() {
    let repo = Arc::new(MemoryRepo {
      corrupt: true,
      ..Default::default()
    });
    let store = SnapshotStore::open(repo, 3600, 0).await;
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn test_open_prunes_stale_snapshots() {
    let repo = Arc::new(MemoryRepo::default());
    *repo.stored.lock().unwrap() = Some(vec![snapshot(0, 1.0), snapshot(5_000, 2.0)]);
    let store = SnapshotStore::open(repo, 3_600, 6_000).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.nearest_at_or_before("m", 6_000), Some(2.0));
  }

  #[tokio::test]
  async fn test_append_persists_pruned_history() {
    let repo = Arc::new(MemoryRepo::default());
    let mut store = SnapshotStore::empty(repo.clone(), 100);
    store.append(snapshot(0, 1.0), 0).await.unwrap();
    store.append(snapshot(150, 2.0), 150).await.unwrap();

    let stored = repo.stored.lock().unwrap().clone().unwrap();
    assert_eq!(stored, vec![snapshot(150, 2.0)]);
  }

  #[tokio::test]
  async fn test_failed_save_keeps_memory() {
    let repo = Arc::new(MemoryRepo {
      fail_save: true,
      ..Default::default()
    });
    let mut store = SnapshotStore::empty(repo, 100);
    assert!(store.append(snapshot(10, 1.0), 10).await.is_err());
    assert_eq!(store.len(), 1);
    assert!(!store.is_healthy().await);
  }

  #[tokio::test]
  async fn test_shorter_retention_prunes_immediately() {
    let repo = Arc::new(MemoryRepo::default());
    let mut store = SnapshotStore::empty(repo, 10_000);
    store.append(snapshot(1_000, 1.0), 1_000).await.unwrap();
    store.append(snapshot(5_000, 2.0), 5_000).await.unwrap();

    assert_eq!(store.set_retention(2_000, 6_000), 1);
    assert_eq!(store.nearest_at_or_before("m", 6_000), Some(2.0));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn test_out_of_order_append_rejected() {
    let repo = Arc::new(MemoryRepo::default());
    let mut store = SnapshotStore::empty(repo, 1_000);
    store.append(snapshot(500, 1.0), 500).await.unwrap();
    let err = store.append(snapshot(400, 1.0), 500).await.unwrap_err();
    assert!(matches!(err, StoreError::OutOfOrder { .. }));
  }
}
