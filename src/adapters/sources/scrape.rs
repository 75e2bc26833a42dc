//! Unstructured page scrape source.
//!
//! Last resort in a chain. The extractor only accepts numbers whose
//! magnitude lies within the configured bounds, so page furniture such
//! as footnote markers or list indices is not mistaken for the value.

use std::sync::Arc;

use async_trait::async_trait;

use super::parsers::{self, ScrapePattern};
use super::RequestTemplate;
use crate::domain::error::FetchError;
use crate::ports::source::Source;
use crate::ports::transport::HttpTransport;

pub struct ScrapeSource {
  transport: Arc<dyn HttpTransport>,
  request: RequestTemplate,
  anchor: String,
  window: usize,
  min_magnitude: f64,
  max_magnitude: Option<f64>,
}

impl ScrapeSource {
  pub fn new(
    transport: Arc<dyn HttpTransport>,
    request: RequestTemplate,
    anchor: String,
    window: usize,
    min_magnitude: f64,
    max_magnitude: Option<f64>,
  ) -> Self {
    Self {
      transport,
      request,
      anchor,
      window,
      min_magnitude,
      max_magnitude,
    }
  }
}

#[async_trait]
impl Source for ScrapeSource {
  fn describe(&self) -> String {
    format!("scrape {}", self.request.host())
  }

  async fn attempt(&self, _metric: &str) -> Result<f64, FetchError> {
    let request = self.request.render(None)?;
    let body = self.transport.get_text(&request).await?;
    parsers::scrape_number(
      &body,
      &ScrapePattern {
        anchor: &self.anchor,
        window: self.window,
        min_magnitude: self.min_magnitude,
        max_magnitude: self.max_magnitude,
      },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::http::Credentials;
  use crate::config::RequestConfig;
  use crate::ports::transport::HttpRequest;

  struct Page(&'static str);

  #[async_trait]
  impl HttpTransport for Page {
    async fn get_text(&self, _request: &HttpRequest) -> Result<String, FetchError> {
      Ok(self.0.to_string())
    }
  }

  fn source(body: &'static str) -> ScrapeSource {
    let request = RequestTemplate::new(
      RequestConfig {
        url: "https://www.blockchaincenter.net/en/altcoin-season-index/".into(),
        query: Default::default(),
        headers: Default::default(),
      },
      Arc::new(Credentials::default()),
    );
    ScrapeSource::new(
      Arc::new(Page(body)),
      request,
      "Altcoin Season Index".into(),
      200,
      10.0,
      Some(100.0),
    )
  }

  #[test]
  fn test_scrape_skips_page_furniture() {
    let s = source("<h1>Altcoin Season Index</h1><p>Step 3 of 4</p><span class=\"value\">64</span>");
    assert_eq!(tokio_test::block_on(s.attempt("season")).unwrap(), 64.0);
    assert_eq!(s.describe(), "scrape www.blockchaincenter.net");
  }

  #[test]
  fn test_scrape_without_anchor_fails() {
    let s = source("<html><body>Bitcoin Season</body></html>");
    let err = tokio_test::block_on(s.attempt("season")).unwrap_err();
    assert_eq!(err.label(), "unparseable");
  }
}
