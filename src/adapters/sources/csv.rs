//! CSV download source.

use std::sync::Arc;

use async_trait::async_trait;

use super::parsers;
use super::RequestTemplate;
use crate::domain::error::FetchError;
use crate::ports::source::Source;
use crate::ports::transport::HttpTransport;

/// Reads `column` from the last data row of a CSV body.
pub struct CsvSource {
  transport: Arc<dyn HttpTransport>,
  request: RequestTemplate,
  column: String,
}

impl CsvSource {
  pub fn new(transport: Arc<dyn HttpTransport>, request: RequestTemplate, column: String) -> Self {
    Self {
      transport,
      request,
      column,
    }
  }
}

#[async_trait]
impl Source for CsvSource {
  fn describe(&self) -> String {
    format!("csv {} [{}]", self.request.host(), self.column)
  }

  async fn attempt(&self, _metric: &str) -> Result<f64, FetchError> {
    let request = self.request.render(None)?;
    let body = self.transport.get_text(&request).await?;
    parsers::csv_last_value(&body, &self.column)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::http::Credentials;
  use crate::config::RequestConfig;
  use crate::ports::transport::HttpRequest;

  struct Echo;

  #[async_trait]
  impl HttpTransport for Echo {
    async fn get_text(&self, request: &HttpRequest) -> Result<String, FetchError> {
      let auth = request
        .headers
        .iter()
        .find(|(k, _)| k == "Authorization")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
      Ok(format!("date,value,auth\n2024-01-01,\"1,250\",{auth}\n"))
    }
  }

  #[test]
  fn test_csv_source_renders_credentials() {
    let mut headers = std::collections::BTreeMap::new();
    headers.insert("Authorization".to_string(), "Bearer {KEY}".to_string());
    let request = RequestTemplate::new(
      RequestConfig {
        url: "https://data.example.com/flows.csv".into(),
        query: Default::default(),
        headers,
      },
      Arc::new(Credentials::from_pairs([("KEY", "k1")])),
    );
    let source = CsvSource::new(Arc::new(Echo), request, "value".into());

    assert_eq!(tokio_test::block_on(source.attempt("netflow")).unwrap(), 1250.0);
    assert_eq!(source.describe(), "csv data.example.com [value]");
  }
}
