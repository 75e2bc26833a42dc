//! Snapshot File - Atomic JSON Snapshot Persistence
//!
//! Saves the retained snapshot sequence to a single JSON file using
//! atomic writes (write tmp, fsync, rename). The file on disk is always
//! either the previous or the new version, never a partial write.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::StoreError;
use crate::domain::snapshot::Snapshot;
use crate::ports::repository::SnapshotRepository;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedRef<'a> {
    version: u32,
    snapshots: &'a [Snapshot],
}

#[derive(Deserialize)]
struct Persisted {
    version: u32,
    snapshots: Vec<Snapshot>,
}

/// Atomic JSON snapshot file.
pub struct SnapshotFile {
    /// Path to the snapshot file.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
    /// Serializes writers so two saves never share the tmp file.
    write_lock: Mutex<()>,
}

impl SnapshotFile {
    /// Create a snapshot file handle, creating the parent directory.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");

        Ok(Self {
            path,
            tmp_path: PathBuf::from(tmp),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_tmp(&self, json: &[u8]) -> Result<(), StoreError> {
        let mut file = fs::File::create(&self.tmp_path).await?;
        file.write_all(json).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for SnapshotFile {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Vec<Snapshot>>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot file found, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let persisted: Persisted = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("invalid snapshot JSON: {e}")))?;

        if persisted.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported snapshot format version {}",
                persisted.version
            )));
        }

        debug!(snapshots = persisted.snapshots.len(), "Snapshot file loaded");
        Ok(Some(persisted.snapshots))
    }

    #[instrument(skip(self, snapshots), fields(path = %self.path.display(), snapshots = snapshots.len()))]
    async fn save(&self, snapshots: &[Snapshot]) -> Result<(), StoreError> {
        let json = serde_json::to_vec(&PersistedRef {
            version: FORMAT_VERSION,
            snapshots,
        })?;

        let _guard = self.write_lock.lock().await;

        if let Err(e) = self.write_tmp(&json).await {
            let _ = fs::remove_file(&self.tmp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&self.tmp_path, &self.path).await {
            warn!(error = %e, "Atomic rename failed, previous file kept");
            let _ = fs::remove_file(&self.tmp_path).await;
            return Err(StoreError::Io(e));
        }

        debug!("Snapshot file saved");
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => Path::new("."),
        };
        match fs::metadata(dir).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::{Metric, MetricKind, MetricVector};

    fn snapshot(ts: i64, value: Option<f64>) -> Snapshot {
        let mut v = MetricVector::new();
        let metric = match value {
            Some(x) => Metric::available(MetricKind::PercentagePoint, x),
            None => Metric::unavailable(MetricKind::PercentagePoint),
        };
        v.insert("btc_dominance", metric);
        Snapshot::new(ts, v)
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested/snapshots.json"))
            .await
            .unwrap();
        assert!(file.load().await.unwrap().is_none());
        assert!(file.is_healthy().await);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("snapshots.json"))
            .await
            .unwrap();
        let snapshots = vec![snapshot(100, Some(52.0)), snapshot(200, None)];

        file.save(&snapshots).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(snapshots));
        assert!(!dir.path().join("snapshots.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unavailable_persists_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("s.json")).await.unwrap();
        file.save(&[snapshot(1, None)]).await.unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("\"version\":1"));
        assert!(text.contains("\"value\":null"));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        std::fs::write(&path, "{ not json").unwrap();
        let file = SnapshotFile::new(&path).await.unwrap();
        assert!(matches!(file.load().await, Err(StoreError::Corrupt(_))));

        std::fs::write(&path, r#"{"version":9,"snapshots":[]}"#).unwrap();
        assert!(matches!(file.load().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("snapshots.json"))
            .await
            .unwrap();
        file.save(&[snapshot(1, Some(1.0))]).await.unwrap();
        file.save(&[snapshot(2, Some(2.0))]).await.unwrap();
        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].timestamp, 2);
    }
}
