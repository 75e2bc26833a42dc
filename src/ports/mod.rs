//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `HttpTransport`: Outbound GET with pacing and timeouts
//! - `Source`: One attempt at producing a metric value
//! - `SnapshotRepository`: Atomic snapshot persistence

pub mod repository;
pub mod source;
pub mod transport;

pub use repository::SnapshotRepository;
pub use source::Source;
pub use transport::{HttpRequest, HttpTransport};
