//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, file I/O, Prometheus). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `http`: Paced reqwest client and credential templating
//! - `sources`: API, CSV and scrape sources plus their parsers
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: Atomic JSON snapshot file

pub mod http;
pub mod metrics;
pub mod persistence;
pub mod sources;
