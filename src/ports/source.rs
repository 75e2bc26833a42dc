//! Source Port - One Attempt in a Metric's Fallback Chain
//!
//! A source produces a single raw number for a metric, or says why it
//! could not. Kind coercion and fallback ordering happen in the fetcher,
//! so a source only knows its provider and payload shape.

use async_trait::async_trait;

use crate::domain::error::FetchError;

/// Trait for network-backed metric sources (API, CSV, scrape).
#[async_trait]
pub trait Source: Send + Sync + 'static {
  /// Short description for logs, e.g. `api api.coingecko.com`.
  fn describe(&self) -> String;

  /// Make exactly one attempt at producing the metric's raw value.
  async fn attempt(&self, metric: &str) -> Result<f64, FetchError>;
}
