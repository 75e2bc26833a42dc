//! Metric Source Adapters
//!
//! Concrete `Source` implementations for the three network-backed
//! attempt types, and the builder that turns `[[metrics]]` config into
//! fetcher plans.
//!
//! Source types:
//! - `api`: JSON payload read by a named parser, optionally paged
//! - `csv`: one column of the last data row
//! - `scrape`: first plausible number after an anchor in HTML/text

pub mod api;
pub mod csv;
pub mod parsers;
pub mod scrape;

use std::sync::Arc;

use crate::adapters::http::Credentials;
use crate::config::{AppConfig, RequestConfig, SourceConfig};
use crate::domain::error::FetchError;
use crate::ports::transport::{HttpRequest, HttpTransport};
use crate::usecases::fetcher::{Attempt, MetricPlan};

pub use api::ApiSource;
pub use csv::CsvSource;
pub use scrape::ScrapeSource;

/// Placeholder substituted with the page number by paged sources.
pub const PAGE_PLACEHOLDER: &str = "page";

/// A request whose templates are rendered per attempt.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
  config: RequestConfig,
  credentials: Arc<Credentials>,
}

impl RequestTemplate {
  pub fn new(config: RequestConfig, credentials: Arc<Credentials>) -> Self {
    Self { config, credentials }
  }

  /// Host part of the URL, for logs.
  pub fn host(&self) -> String {
    reqwest::Url::parse(&self.config.url)
      .ok()
      .and_then(|u| u.host_str().map(str::to_string))
      .unwrap_or_else(|| self.config.url.clone())
  }

  /// Render credentials and, when given, the page number.
  ///
  /// A missing credential fails before any network call.
  pub fn render(&self, page: Option<u32>) -> Result<HttpRequest, FetchError> {
    let passthrough = [PAGE_PLACEHOLDER];
    let fill = |template: &str| -> Result<String, FetchError> {
      let rendered = self.credentials.render(template, &passthrough)?;
      Ok(match page {
        Some(p) => rendered.replace("{page}", &p.to_string()),
        None => rendered,
      })
    };

    let render_pairs = |pairs: &std::collections::BTreeMap<String, String>| {
      pairs
        .iter()
        .map(|(k, v)| fill(v).map(|v| (k.clone(), v)))
        .collect::<Result<Vec<_>, FetchError>>()
    };

    Ok(HttpRequest {
      url: fill(&self.config.url)?,
      query: render_pairs(&self.config.query)?,
      headers: render_pairs(&self.config.headers)?,
    })
  }
}

/// Turn metric definitions into fetcher plans, in config order.
pub fn build_plans(
  config: &AppConfig,
  transport: Arc<dyn HttpTransport>,
  credentials: Arc<Credentials>,
) -> Vec<MetricPlan> {
  config
    .metrics
    .iter()
    .map(|metric| {
      let attempts = metric
        .sources
        .iter()
        .map(|source| build_attempt(source, &transport, &credentials))
        .collect();
      MetricPlan::new(metric.name.clone(), metric.kind, attempts)
    })
    .collect()
}

fn build_attempt(
  source: &SourceConfig,
  transport: &Arc<dyn HttpTransport>,
  credentials: &Arc<Credentials>,
) -> Attempt {
  let template = |request: &RequestConfig| RequestTemplate::new(request.clone(), Arc::clone(credentials));

  match source {
    SourceConfig::Api {
      request,
      parser,
      pages,
    } => Attempt::Source(Arc::new(ApiSource::new(
      Arc::clone(transport),
      template(request),
      parser.clone(),
      *pages,
    ))),
    SourceConfig::Csv { request, column } => Attempt::Source(Arc::new(CsvSource::new(
      Arc::clone(transport),
      template(request),
      column.clone(),
    ))),
    SourceConfig::Scrape {
      request,
      anchor,
      min_magnitude,
      max_magnitude,
      window,
    } => Attempt::Source(Arc::new(ScrapeSource::new(
      Arc::clone(transport),
      template(request),
      anchor.clone(),
      *window,
      *min_magnitude,
      *max_magnitude,
    ))),
    SourceConfig::Derived { op, inputs } => Attempt::Derived {
      op: *op,
      inputs: inputs.clone(),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn request(url: &str, query: &[(&str, &str)], headers: &[(&str, &str)]) -> RequestConfig {
    let to_map = |pairs: &[(&str, &str)]| {
      pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
    };
    RequestConfig {
      url: url.to_string(),
      query: to_map(query),
      headers: to_map(headers),
    }
  }

  #[test]
  fn test_render_credentials_and_page() {
    let creds = Arc::new(Credentials::from_pairs([("KEY", "s3cret")]));
    let template = RequestTemplate::new(
      request(
        "https://api.example.com/markets",
        &[("page", "{page}"), ("per_page", "250")],
        &[("Authorization", "Bearer {KEY}")],
      ),
      creds,
    );

    let rendered = template.render(Some(3)).unwrap();
    assert_eq!(rendered.url, "https://api.example.com/markets");
    assert_eq!(
      rendered.query,
      vec![
        ("page".to_string(), "3".to_string()),
        ("per_page".to_string(), "250".to_string())
      ]
    );
    assert_eq!(
      rendered.headers,
      vec![("Authorization".to_string(), "Bearer s3cret".to_string())]
    );
    assert_eq!(template.host(), "api.example.com");
  }

  #[test]
  fn test_render_missing_credential() {
    let template = RequestTemplate::new(
      request("https://x.test", &[], &[("coinglassSecret", "{COINGLASS_API_KEY}")]),
      Arc::new(Credentials::default()),
    );
    assert_eq!(
      template.render(None),
      Err(FetchError::MissingCredential("COINGLASS_API_KEY".into()))
    );
  }
}
