//! Structured JSON API source, optionally paged.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::parsers::{self, VolumeTotals};
use super::RequestTemplate;
use crate::config::JsonParser;
use crate::domain::error::FetchError;
use crate::ports::source::Source;
use crate::ports::transport::HttpTransport;

pub struct ApiSource {
  transport: Arc<dyn HttpTransport>,
  request: RequestTemplate,
  parser: JsonParser,
  pages: Option<u32>,
}

impl ApiSource {
  pub fn new(
    transport: Arc<dyn HttpTransport>,
    request: RequestTemplate,
    parser: JsonParser,
    pages: Option<u32>,
  ) -> Self {
    Self {
      transport,
      request,
      parser,
      pages,
    }
  }

  async fn single(&self) -> Result<f64, FetchError> {
    let request = self.request.render(None)?;
    let body = self.transport.get_text(&request).await?;
    parsers::apply(&self.parser, &parsers::parse_json(&body)?)
  }

  /// Pages 1..=N in order, stopping at the first failed or empty page.
  async fn paged(&self, pages: u32, metric: &str) -> Result<f64, FetchError> {
    let mut totals = VolumeTotals::default();
    let mut good_pages = 0u32;
    let mut first_error = None;

    for page in 1..=pages {
      let request = self.request.render(Some(page))?;
      let page_totals = match self.transport.get_text(&request).await {
        Ok(body) => parsers::parse_json(&body).and_then(|v| totals.add_page(&v)),
        Err(e) => Err(e),
      };

      match page_totals {
        Ok(next) if next.coins == totals.coins => break,
        Ok(next) => {
          totals = next;
          good_pages += 1;
        }
        Err(e) => {
          debug!(metric, page, error = %e, "Page failed, stopping");
          first_error = Some(e);
          break;
        }
      }
    }

    if good_pages == 0 {
      return Err(FetchError::SourceUnreachable(match first_error {
        Some(e) => format!("no usable pages from {}: {e}", self.request.host()),
        None => format!("no usable pages from {}", self.request.host()),
      }));
    }

    debug!(metric, good_pages, coins = totals.coins, "Pages accumulated");
    totals.ratio()
  }
}

#[async_trait]
impl Source for ApiSource {
  fn describe(&self) -> String {
    format!("api {}", self.request.host())
  }

  async fn attempt(&self, metric: &str) -> Result<f64, FetchError> {
    match self.pages {
      Some(pages) => self.paged(pages, metric).await,
      None => self.single().await,
    }
  }
}
