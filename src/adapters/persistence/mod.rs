//! Persistence Adapters - File Storage
//!
//! Implements the `SnapshotRepository` port with a single atomically
//! replaced JSON file.

pub mod snapshot_file;

pub use snapshot_file::SnapshotFile;
