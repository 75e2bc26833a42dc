//! Payload Parsers - Provider JSON, CSV and HTML Extraction
//!
//! Pure functions from a fetched body to one raw number. Each named
//! parser knows exactly one provider payload shape, so every shape can be
//! tested against a fixture without a network. Kind/domain coercion is
//! applied later by the fetcher.

use serde_json::Value;

use crate::config::JsonParser;
use crate::domain::error::FetchError;

/// Parse a JSON body text.
pub fn parse_json(body: &str) -> Result<Value, FetchError> {
  serde_json::from_str(body).map_err(|e| FetchError::UnparseableValue(format!("invalid JSON: {e}")))
}

/// Apply a single-page named parser.
pub fn apply(parser: &JsonParser, payload: &Value) -> Result<f64, FetchError> {
  match parser {
    JsonParser::JsonPointer { pointer } => number_at(payload, pointer),
    JsonParser::CoingeckoDominance { symbol } => {
      number_at(payload, &format!("/data/market_cap_percentage/{}", symbol.to_lowercase()))
    }
    JsonParser::CoingeckoTotalMarketCap => number_at(payload, "/data/total_market_cap/usd"),
    JsonParser::CoingeckoPriceChange7d => {
      number_at(payload, "/0/price_change_percentage_7d_in_currency")
    }
    JsonParser::DefillamaAverageChange7d => {
      let protocols = payload
        .get("protocols")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("protocols"))?;
      mean(protocols.iter().filter_map(|p| p.get("change_7d")), "change_7d")
    }
    JsonParser::CoinglassAverageFunding => {
      let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("data"))?;
      mean(rows.iter().filter_map(|r| r.get("fundingRate")), "fundingRate")
    }
    JsonParser::CryptoquantLatestValue => {
      let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("data"))?;
      let last = rows.last().ok_or_else(|| missing("data[-1]"))?;
      last
        .get("value")
        .and_then(as_number)
        .ok_or_else(|| missing("data[-1].value"))
    }
    JsonParser::CoingeckoVolumeRatio => {
      let totals = VolumeTotals::default().add_page(payload)?;
      totals.ratio()
    }
    JsonParser::BlockchaincenterSeasonIndex => payload
      .get("seasonIndex")
      .and_then(as_number)
      .map(f64::round)
      .ok_or_else(|| missing("seasonIndex")),
  }
}

/// Number or numeric string at an RFC 6901 pointer.
fn number_at(payload: &Value, pointer: &str) -> Result<f64, FetchError> {
  payload
    .pointer(pointer)
    .and_then(as_number)
    .ok_or_else(|| missing(pointer))
}

/// Numbers and numeric strings. `"NaN"`, `"inf"` and overflowing strings are not numbers.
fn as_number(value: &Value) -> Option<f64> {
  let parsed = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  parsed.filter(|v| v.is_finite())
}

fn mean<'a>(values: impl Iterator<Item = &'a Value>, field: &str) -> Result<f64, FetchError> {
  let (sum, count) = values
    .filter_map(as_number)
    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
  if count == 0 {
    return Err(FetchError::UnparseableValue(format!("no {field} values")));
  }
  Ok(sum / count as f64)
}

fn missing(what: &str) -> FetchError {
  FetchError::UnparseableValue(format!("missing numeric field {what}"))
}

/// 24h volume totals accumulated over CoinGecko market pages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeTotals {
  pub btc: f64,
  pub alt: f64,
  pub coins: usize,
}

impl VolumeTotals {
  /// Add one `/coins/markets` page. A non-array payload is an error.
  pub fn add_page(mut self, payload: &Value) -> Result<Self, FetchError> {
    let coins = payload
      .as_array()
      .ok_or_else(|| FetchError::UnparseableValue("markets page is not an array".into()))?;

    for coin in coins {
      let volume = coin.get("total_volume").and_then(as_number).unwrap_or(0.0);
      if is_bitcoin(coin) {
        self.btc += volume;
      } else {
        self.alt += volume;
      }
    }
    self.coins += coins.len();
    Ok(self)
  }

  pub fn ratio(&self) -> Result<f64, FetchError> {
    if self.btc <= 0.0 {
      return Err(FetchError::UnparseableValue("no BTC volume in markets pages".into()));
    }
    Ok(self.alt / self.btc)
  }
}

fn is_bitcoin(coin: &Value) -> bool {
  let field = |k: &str| coin.get(k).and_then(Value::as_str).unwrap_or_default();
  field("symbol").eq_ignore_ascii_case("btc")
    || field("id") == "bitcoin"
    || field("name").eq_ignore_ascii_case("bitcoin")
}

/// Named column of the last non-empty CSV data row.
pub fn csv_last_value(body: &str, column: &str) -> Result<f64, FetchError> {
  let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

  let header = lines
    .next()
    .ok_or_else(|| FetchError::UnparseableValue("empty CSV".into()))?;
  let index = split_csv_row(header)
    .iter()
    .position(|h| h.eq_ignore_ascii_case(column))
    .ok_or_else(|| FetchError::UnparseableValue(format!("CSV has no column {column}")))?;

  let last = lines
    .last()
    .ok_or_else(|| FetchError::UnparseableValue("CSV has no data rows".into()))?;
  let cells = split_csv_row(last);
  let cell = cells
    .get(index)
    .ok_or_else(|| FetchError::UnparseableValue(format!("last CSV row has no {column} cell")))?;

  parse_number_token(cell)
    .ok_or_else(|| FetchError::UnparseableValue(format!("CSV cell {cell:?} is not a number")))
}

/// Split one CSV row, honoring double-quoted cells.
fn split_csv_row(row: &str) -> Vec<String> {
  let mut cells = Vec::new();
  let mut cell = String::new();
  let mut quoted = false;
  let mut chars = row.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '"' if quoted && chars.peek() == Some(&'"') => {
        cell.push('"');
        chars.next();
      }
      '"' => quoted = !quoted,
      ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
      _ => cell.push(c),
    }
  }
  cells.push(cell.trim().to_string());
  cells
}

/// Parse a human-formatted number: `$1,234.5`, `81%`, `2.4B`, `-3.1`.
pub fn parse_number_token(token: &str) -> Option<f64> {
  let cleaned: String = token
    .trim()
    .chars()
    .filter(|c| !matches!(c, ',' | '$' | '%' | '+' | ' '))
    .collect();

  let (digits, multiplier) = match cleaned.chars().last()?.to_ascii_lowercase() {
    'k' => (&cleaned[..cleaned.len() - 1], 1e3),
    'm' => (&cleaned[..cleaned.len() - 1], 1e6),
    'b' => (&cleaned[..cleaned.len() - 1], 1e9),
    't' => (&cleaned[..cleaned.len() - 1], 1e12),
    _ => (cleaned.as_str(), 1.0),
  };

  let value: f64 = digits.parse().ok()?;
  value.is_finite().then_some(value * multiplier)
}

/// Bounds for the scrape extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrapePattern<'a> {
  pub anchor: &'a str,
  pub window: usize,
  pub min_magnitude: f64,
  pub max_magnitude: Option<f64>,
}

/// First plausible number after any occurrence of the anchor text.
///
/// Markup is stripped first. Within `window` characters after an anchor,
/// number tokens whose magnitude falls outside the bounds are skipped.
pub fn scrape_number(body: &str, pattern: &ScrapePattern<'_>) -> Result<f64, FetchError> {
  let text = strip_markup(body);
  let mut found_anchor = false;

  for (pos, _) in text.match_indices(pattern.anchor) {
    found_anchor = true;
    let after: String = text[pos + pattern.anchor.len()..]
      .chars()
      .take(pattern.window)
      .collect();

    let plausible = number_tokens(&after)
      .filter_map(parse_number_token)
      .find(|v| {
        let m = v.abs();
        m >= pattern.min_magnitude && pattern.max_magnitude.is_none_or(|max| m <= max)
      });

    if let Some(value) = plausible {
      return Ok(value);
    }
  }

  Err(FetchError::UnparseableValue(if found_anchor {
    format!("no plausible number after {:?}", pattern.anchor)
  } else {
    format!("anchor {:?} not found", pattern.anchor)
  }))
}

/// Remove tags, scripts and styles; collapse whitespace.
fn strip_markup(html: &str) -> String {
  let mut out = String::with_capacity(html.len());
  let mut rest = html;

  while let Some(start) = rest.find('<') {
    out.push_str(&rest[..start]);
    out.push(' ');
    let tag = &rest[start..];
    let lower_prefix: String = tag.chars().take(8).collect::<String>().to_ascii_lowercase();
    let close = if lower_prefix.starts_with("<script") {
      "</script>"
    } else if lower_prefix.starts_with("<style") {
      "</style>"
    } else {
      ">"
    };
    match find_ci(tag, close) {
      Some(end) => rest = &tag[end + close.len()..],
      None => {
        rest = "";
      }
    }
  }
  out.push_str(rest);

  out.replace("&nbsp;", " ")
    .replace("&amp;", "&")
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
  haystack.to_ascii_lowercase().find(needle)
}

/// Candidate number tokens: a digit run with separators, sign and suffix.
fn number_tokens(text: &str) -> impl Iterator<Item = &str> {
  let bytes = text.as_bytes();
  let mut i = 0;

  std::iter::from_fn(move || {
    while i < bytes.len() {
      if bytes[i].is_ascii_digit() {
        let mut start = i;
        if start > 0 && bytes[start - 1] == b'-' {
          start -= 1;
        } else if start > 1 && bytes[start - 1] == b'$' && bytes[start - 2] == b'-' {
          start -= 2;
        }
        let mut end = i;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || matches!(bytes[end], b',' | b'.')) {
          end += 1;
        }
        // One-letter magnitude suffix, only when not the start of a word.
        if end < bytes.len()
          && matches!(bytes[end].to_ascii_lowercase(), b'k' | b'm' | b'b' | b't')
          && bytes.get(end + 1).is_none_or(|b| !b.is_ascii_alphabetic())
        {
          end += 1;
        }
        i = end;
        let token = text[start..end].trim_end_matches(['.', ',']);
        return Some(token);
      }
      i += 1;
    }
    None
  })
}
