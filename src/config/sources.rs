//! Source attempt definitions for `[[metrics.sources]]` tables.
//!
//! Each table is one attempt in a metric's fallback chain. Adding,
//! removing or reordering attempts is a config edit only.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::derived::DerivedOp;

/// Target of one HTTP GET.
///
/// Query and header values may contain `{NAME}` placeholders that are
/// filled from configured credentials, and `{page}` for paged sources.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
  pub url: String,
  #[serde(default)]
  pub query: BTreeMap<String, String>,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
}

/// One source attempt.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
  /// Structured JSON API read by a named parser.
  Api {
    #[serde(flatten)]
    request: RequestConfig,
    parser: JsonParser,
    /// Fetch pages 1..=N, substituting `{page}`.
    #[serde(default)]
    pages: Option<u32>,
  },
  /// CSV download; the named column of the last data row.
  Csv {
    #[serde(flatten)]
    request: RequestConfig,
    column: String,
  },
  /// HTML/text page; the first plausible number after an anchor.
  Scrape {
    #[serde(flatten)]
    request: RequestConfig,
    anchor: String,
    /// Smallest accepted absolute value. Filters stray single digits.
    #[serde(default = "default_min_magnitude")]
    min_magnitude: f64,
    /// Largest accepted absolute value.
    #[serde(default)]
    max_magnitude: Option<f64>,
    /// Characters searched after each anchor occurrence.
    #[serde(default = "default_scrape_window")]
    window: usize,
  },
  /// Computed from other metrics of the same cycle.
  Derived { op: DerivedOp, inputs: Vec<String> },
}

impl SourceConfig {
  /// Metric names this attempt depends on.
  pub fn dependencies(&self) -> &[String] {
    match self {
      Self::Derived { inputs, .. } => inputs,
      _ => &[],
    }
  }

  pub fn request(&self) -> Option<&RequestConfig> {
    match self {
      Self::Api { request, .. } | Self::Csv { request, .. } | Self::Scrape { request, .. } => {
        Some(request)
      }
      Self::Derived { .. } => None,
    }
  }
}

/// Named JSON payload parsers.
///
/// Each one is a fixed, testable function over the provider's payload
/// shape. `JsonPointer` covers providers that expose a single field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum JsonParser {
  /// Number (or numeric string) at an RFC 6901 pointer.
  JsonPointer { pointer: String },
  /// CoinGecko `/global`: `data.market_cap_percentage.<symbol>`.
  CoingeckoDominance { symbol: String },
  /// CoinGecko `/global`: `data.total_market_cap.usd`.
  CoingeckoTotalMarketCap,
  /// CoinGecko `/coins/markets`: first row's 7d change in the quote currency.
  CoingeckoPriceChange7d,
  /// DeFiLlama overview: mean of protocols' `change_7d`.
  DefillamaAverageChange7d,
  /// Coinglass funding rates: mean of `data[].fundingRate`.
  CoinglassAverageFunding,
  /// CryptoQuant series: `value` of the last `data` row.
  CryptoquantLatestValue,
  /// CoinGecko `/coins/markets` pages: alt 24h volume over BTC 24h volume.
  CoingeckoVolumeRatio,
  /// blockchaincenter.net: `seasonIndex`, rounded to an integer.
  BlockchaincenterSeasonIndex,
}

fn default_min_magnitude() -> f64 {
  10.0
}

fn default_scrape_window() -> usize {
  200
}
