//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! monitor's workflows.
//!
//! Use cases:
//! - `MetricFetcher`: Ordered fallback chains, derived metrics
//! - `SnapshotStore`: History with single-writer append and persist
//! - `Evaluator`: One full evaluation cycle
//! - `report`: Text rendering of a cycle result
//! - `DailySchedule`: When the next scheduled cycle runs

pub mod evaluator;
pub mod fetcher;
pub mod report;
pub mod scheduler;
pub mod store;

pub use evaluator::{EvaluationResult, EvaluationSettings, Evaluator};
pub use fetcher::{Attempt, FetchOutcome, FetchedVector, MetricFetcher, MetricPlan};
pub use scheduler::DailySchedule;
pub use store::SnapshotStore;
