//! HTTP Transport Port - Outbound GET Interface
//!
//! Every network-backed source talks to the outside world through this
//! trait. Tests substitute a mock that replays canned payloads.

use async_trait::async_trait;

use crate::domain::error::FetchError;

/// A fully rendered GET request. Credentials are already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  /// Target URL without query string.
  pub url: String,
  /// Query parameters in declared order.
  pub query: Vec<(String, String)>,
  /// Extra request headers.
  pub headers: Vec<(String, String)>,
}

impl HttpRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      query: Vec::new(),
      headers: Vec::new(),
    }
  }
}

/// Trait for outbound HTTP providers.
///
/// Implementations own timeouts, pacing and concurrency limits. They
/// must not retry: a failed request is reported and the fallback chain
/// moves on to its next attempt.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
  /// Perform a GET and return the body text of a 2xx response.
  ///
  /// Non-2xx statuses map to `FetchError::HttpStatus`, transport and
  /// body failures to `FetchError::SourceUnreachable`.
  async fn get_text(&self, request: &HttpRequest) -> Result<String, FetchError>;
}
