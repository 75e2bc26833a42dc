//! Source HTTP Client - Paced, Bounded reqwest Client
//!
//! Wraps reqwest with a shared request pacer and a concurrency limit for
//! every network-backed metric source. There are no retries here: a
//! failed request is one failed attempt, and the metric's fallback chain
//! decides what happens next.
//!
//! The timeout covers the whole attempt, including waiting for a permit
//! and for the pacer, so a stalled source delays no other fetch beyond
//! that bound.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::domain::error::FetchError;
use crate::ports::transport::{HttpRequest, HttpTransport};

/// Configuration for the source HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
  /// Per-request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Sustained request rate across all sources.
  pub requests_per_second: u32,
  /// User-Agent header value.
  pub user_agent: String,
}

impl From<&HttpConfig> for HttpClientConfig {
  fn from(config: &HttpConfig) -> Self {
    Self {
      timeout: Duration::from_secs(config.timeout_seconds),
      max_concurrent: config.max_concurrent,
      requests_per_second: config.requests_per_second,
      user_agent: config.user_agent.clone(),
    }
  }
}

/// Rate-limited HTTP client shared by all sources.
pub struct HttpClient {
  /// Underlying HTTP client.
  http: Client,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request pacer.
  limiter: DefaultDirectRateLimiter,
  /// Bound on one whole attempt.
  timeout: Duration,
}

impl HttpClient {
  /// Create a new client.
  pub fn new(config: HttpClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .user_agent(config.user_agent.clone())
      .pool_max_idle_per_host(4)
      .build()
      .context("Failed to build HTTP client")?;

    let rate = NonZeroU32::new(config.requests_per_second)
      .context("requests_per_second must be positive")?;
    anyhow::ensure!(config.max_concurrent > 0, "max_concurrent must be positive");

    Ok(Self {
      http,
      semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
      limiter: RateLimiter::direct(Quota::per_second(rate)),
      timeout: config.timeout,
    })
  }

  async fn send(&self, request: &HttpRequest) -> Result<String, FetchError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| FetchError::SourceUnreachable("HTTP client shut down".into()))?;

    self.limiter.until_ready().await;

    let mut req = self.http.get(&request.url).query(&request.query);
    for (name, value) in &request.headers {
      req = req.header(name.as_str(), value.as_str());
    }

    debug!(url = %request.url, "GET");

    let response = req.send().await.map_err(|e| {
      warn!(url = %request.url, error = %e, "Request failed");
      FetchError::SourceUnreachable(format!("{}: {e}", request.url))
    })?;

    let status = response.status();
    if !status.is_success() {
      warn!(url = %request.url, status = status.as_u16(), "Non-success status");
      return Err(FetchError::HttpStatus {
        status: status.as_u16(),
        url: request.url.clone(),
      });
    }

    response
      .text()
      .await
      .map_err(|e| FetchError::SourceUnreachable(format!("{}: body read failed: {e}", request.url)))
  }
}

#[async_trait]
impl HttpTransport for HttpClient {
  async fn get_text(&self, request: &HttpRequest) -> Result<String, FetchError> {
    match tokio::time::timeout(self.timeout, self.send(request)).await {
      Ok(result) => result,
      Err(_) => {
        warn!(url = %request.url, timeout_ms = self.timeout.as_millis() as u64, "Attempt timed out");
        Err(FetchError::SourceUnreachable(format!(
          "{}: timed out after {:?}",
          request.url, self.timeout
        )))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_from_http_config() {
    let config = HttpClientConfig::from(&HttpConfig::default());
    assert_eq!(config.timeout, Duration::from_secs(25));
    assert!(HttpClient::new(config).is_ok());
  }

  #[test]
  fn test_zero_rate_rejected() {
    let config = HttpClientConfig {
      requests_per_second: 0,
      ..HttpClientConfig::from(&HttpConfig::default())
    };
    assert!(HttpClient::new(config).is_err());
  }

  #[tokio::test]
  async fn test_unreachable_host_is_source_unreachable() {
    let client = HttpClient::new(HttpClientConfig {
      timeout: Duration::from_secs(2),
      ..HttpClientConfig::from(&HttpConfig::default())
    })
    .unwrap();

    // Port 9 on localhost refuses connections.
    let err = client
      .get_text(&HttpRequest::get("http://127.0.0.1:9/"))
      .await
      .unwrap_err();
    assert_eq!(err.label(), "unreachable");
  }

  #[tokio::test]
  async fn test_queued_attempt_bounded_by_timeout() {
    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });

    let timeout = Duration::from_millis(300);
    let client = HttpClient::new(HttpClientConfig {
      timeout,
      max_concurrent: 1,
      ..HttpClientConfig::from(&HttpConfig::default())
    })
    .unwrap();

    let stalled = HttpRequest::get(format!("http://{addr}/stalled"));
    let queued = HttpRequest::get(format!("http://{addr}/queued"));

    let started = std::time::Instant::now();
    let (first, second) = tokio::join!(client.get_text(&stalled), client.get_text(&queued));
    let elapsed = started.elapsed();

    assert_eq!(first.unwrap_err().label(), "unreachable");
    assert_eq!(second.unwrap_err().label(), "unreachable");
    // Without a whole-attempt bound the queued request would take two timeouts.
    assert!(elapsed < timeout * 2, "took {elapsed:?}");
  }
}
