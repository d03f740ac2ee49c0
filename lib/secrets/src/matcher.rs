//! Secretize path matching. Configured wildcard patterns compile
//! to case-insensitive anchored regexes and are checked against
//! both the raw key and its canonical (`__`) form.

use regex::{Regex, RegexBuilder};
use tracing::warn;

pub struct SecretizeMatcher {
  matchers: Vec<Regex>,
}

fn wildcard_to_regex(pattern: &str) -> String {
  let mut out = String::with_capacity(pattern.len() + 2);
  out.push('^');
  for ch in pattern.chars() {
    match ch {
      '*' => out.push_str(".*"),
      '?' => out.push('.'),
      other => out.push_str(&regex::escape(&other.to_string())),
    }
  }
  out.push('$');
  out
}

impl SecretizeMatcher {
  pub fn new(paths: &[String]) -> SecretizeMatcher {
    let matchers = paths
      .iter()
      .filter_map(|path| {
        match RegexBuilder::new(&wildcard_to_regex(path))
          .case_insensitive(true)
          .build()
        {
          Ok(re) => Some(re),
          Err(e) => {
            warn!("invalid secretize path '{path}' | {e}");
            None
          }
        }
      })
      .collect();
    SecretizeMatcher { matchers }
  }

  pub fn is_empty(&self) -> bool {
    self.matchers.is_empty()
  }

  /// True when the raw key or its canonical twin matches any
  /// configured path.
  pub fn is_match(&self, key: &str) -> bool {
    let canon = environment::to_canon(key);
    self
      .matchers
      .iter()
      .any(|re| re.is_match(key) || re.is_match(&canon))
  }
}
