//! Source Credentials - Environment-Backed API Secrets
//!
//! Secrets are read once from the environment variables named in
//! `http.credential_env` and substituted into header and query templates
//! as `{NAME}`. They are never read from ambient state at request time
//! and never logged.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::FetchError;

/// Named API secrets available to source templates.
#[derive(Clone, Default)]
pub struct Credentials {
  values: BTreeMap<String, String>,
}

impl Credentials {
  /// Load every named variable that is set and non-empty.
  ///
  /// Missing variables are not an error here. A source whose template
  /// needs one fails its attempt with `MissingCredential` instead.
  pub fn from_env(names: &[String]) -> Self {
    let values = names
      .iter()
      .filter_map(|name| {
        std::env::var(name)
          .ok()
          .filter(|v| !v.is_empty())
          .map(|v| (name.clone(), v))
      })
      .collect();
    Self { values }
  }

  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Substitute `{NAME}` placeholders.
  ///
  /// Placeholders listed in `passthrough` are left untouched for a later
  /// stage (`{page}` for paged sources). Unknown names fail.
  pub fn render(&self, template: &str, passthrough: &[&str]) -> Result<String, FetchError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
      out.push_str(&rest[..start]);
      let after = &rest[start + 1..];
      let Some(end) = after.find('}') else {
        out.push_str(&rest[start..]);
        return Ok(out);
      };
      let name = &after[..end];
      if passthrough.contains(&name) {
        out.push('{');
        out.push_str(name);
        out.push('}');
      } else {
        let value = self
          .values
          .get(name)
          .ok_or_else(|| FetchError::MissingCredential(name.to_string()))?;
        out.push_str(value);
      }
      rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Names only.
    f.debug_struct("Credentials")
      .field("names", &self.values.keys().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_render_substitutes_known_names() {
    let creds = Credentials::from_pairs([("CQ_KEY", "secret")]);
    assert_eq!(
      creds.render("Bearer {CQ_KEY}", &[]).unwrap(),
      "Bearer secret"
    );
    assert_eq!(creds.render("plain", &[]).unwrap(), "plain");
  }

  #[test]
  fn test_render_missing_credential() {
    let creds = Credentials::default();
    assert_eq!(
      creds.render("Bearer {CQ_KEY}", &[]),
      Err(FetchError::MissingCredential("CQ_KEY".into()))
    );
  }

  #[test]
  fn test_render_keeps_passthrough() {
    let creds = Credentials::default();
    assert_eq!(creds.render("{page}", &["page"]).unwrap(), "{page}");
  }

  #[test]
  fn test_debug_hides_values() {
    let creds = Credentials::from_pairs([("CQ_KEY", "secret")]);
    let shown = format!("{creds:?}");
    assert!(shown.contains("CQ_KEY"));
    assert!(!shown.contains("secret"));
  }

  #[test]
  fn test_from_env_skips_unset() {
    let creds = Credentials::from_env(&["ALTSEASON_TEST_SURELY_UNSET_VAR".to_string()]);
    assert!(creds.is_empty());
  }
}
