//! Error taxonomy for fetch attempts, snapshot persistence and cycles.
//!
//! None of these reach the caller of `run_cycle` for data-quality
//! reasons: fetch errors collapse into `MetricValue::Unavailable`,
//! store errors reset or skip persistence. They exist so every
//! failure is a value that can be logged, counted and tested.

use thiserror::Error;

/// Why a single source attempt did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport failure: DNS, TLS, connect, timeout, body read.
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The payload did not contain a usable number.
    #[error("unparseable value: {0}")]
    UnparseableValue(String),

    /// A number was found but lies outside the metric kind's domain.
    #[error("value {value} outside domain of {kind}")]
    OutOfDomain { value: f64, kind: String },

    /// A derived attempt needed another metric that is unavailable.
    #[error("dependency {0} unavailable")]
    MissingDependency(String),

    /// A header or query template names a secret that is not configured.
    #[error("credential {0} not configured")]
    MissingCredential(String),
}

impl FetchError {
    /// Short stable label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SourceUnreachable(_) => "unreachable",
            Self::HttpStatus { .. } => "http_status",
            Self::UnparseableValue(_) => "unparseable",
            Self::OutOfDomain { .. } => "out_of_domain",
            Self::MissingDependency(_) => "missing_dependency",
            Self::MissingCredential(_) => "missing_credential",
        }
    }
}

/// Snapshot store persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted file exists but cannot be decoded.
    #[error("store corrupt: {0}")]
    Corrupt(String),

    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Snapshots must be appended in non-decreasing timestamp order.
    #[error("snapshot at {timestamp} is older than latest {latest}")]
    OutOfOrder { timestamp: i64, latest: i64 },
}

/// Reasons `run_cycle` refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// Another evaluation cycle has not finished persisting yet.
    #[error("an evaluation cycle is already in progress")]
    CycleInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_labels_are_distinct() {
        let errors = [
            FetchError::SourceUnreachable("timeout".into()),
            FetchError::HttpStatus { status: 429, url: "u".into() },
            FetchError::UnparseableValue("x".into()),
            FetchError::OutOfDomain { value: 101.0, kind: "index_0_to_100".into() },
            FetchError::MissingDependency("btc_dominance".into()),
            FetchError::MissingCredential("KEY".into()),
        ];
        let mut labels: Vec<_> = errors.iter().map(FetchError::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), errors.len());
    }

    #[test]
    fn test_http_status_display() {
        let err = FetchError::HttpStatus { status: 503, url: "https://x".into() };
        assert_eq!(err.to_string(), "HTTP status 503 from https://x");
    }
}
