//! Repository Port - Snapshot Persistence Interface
//!
//! The snapshot store keeps its history in memory and hands the full
//! retained sequence to this port after every append. Implementations
//! must replace the persisted state atomically: a crash mid-save leaves
//! the previous state readable.

use async_trait::async_trait;

use crate::domain::error::StoreError;
use crate::domain::snapshot::Snapshot;

/// Trait for snapshot persistence providers.
#[async_trait]
pub trait SnapshotRepository: Send + Sync + 'static {
  /// Load persisted snapshots.
  ///
  /// `Ok(None)` means nothing has been persisted yet. A file that exists
  /// but cannot be decoded is `Err(StoreError::Corrupt)`.
  async fn load(&self) -> Result<Option<Vec<Snapshot>>, StoreError>;

  /// Atomically replace the persisted snapshots.
  async fn save(&self, snapshots: &[Snapshot]) -> Result<(), StoreError>;

  /// Check if the storage backend is reachable and writable.
  async fn is_healthy(&self) -> bool;
}
