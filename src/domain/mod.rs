//! Domain layer - Metrics, history, trends and signals.
//!
//! Pure logic for the altseason monitor. Nothing in here performs I/O
//! (hexagonal architecture inner ring); every function is testable with
//! in-memory vectors and snapshots.

pub mod derived;
pub mod error;
pub mod metric;
pub mod signals;
pub mod snapshot;
pub mod trend;

// Re-export core types for convenience
pub use derived::DerivedOp;
pub use error::{CycleError, FetchError, StoreError};
pub use metric::{Metric, MetricKind, MetricValue, MetricVector};
pub use signals::{evaluate, AlertLevel, SignalKind, SignalReport, SignalRule, SignalRules};
pub use snapshot::{Snapshot, SnapshotHistory};
pub use trend::{delta, Delta, DeltaKind, NegativeBranch, Trend, TrendBand, TrendBands};
