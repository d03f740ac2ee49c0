//! # SwarmBender token expansion
//!
//! Expands `${NAME}` and `{{NAME}}` tokens in scalar strings.
//! Tokens without a binding are left verbatim, so Compose's own
//! runtime interpolation keeps working for anything SwarmBender
//! does not know about.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

pub type Tokens = IndexMap<String, String>;

fn dollar_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}")
      .expect("invalid dollar token regex")
  })
}

fn braces_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}")
      .expect("invalid braces token regex")
  })
}

fn replace_with(
  re: &Regex,
  input: &str,
  tokens: &Tokens,
) -> String {
  re.replace_all(input, |caps: &Captures| {
    let name = &caps[1];
    match tokens.get(name) {
      Some(value) => value.clone(),
      // unresolved tokens stay verbatim
      None => caps[0].to_string(),
    }
  })
  .into_owned()
}

/// Expand both token syntaxes against the given bindings.
pub fn expand(input: &str, tokens: &Tokens) -> String {
  let first = replace_with(braces_re(), input, tokens);
  replace_with(dollar_re(), &first, tokens)
}

/// In-place variant for the model string visitors.
pub fn expand_in_place(target: &mut String, tokens: &Tokens) {
  let expanded = expand(target, tokens);
  if expanded != *target {
    *target = expanded;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(pairs: &[(&str, &str)]) -> Tokens {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn expands_both_syntaxes_in_one_string() {
    let tokens =
      tokens(&[("COMPANY_NAME", "acme"), ("SB_ENV", "prod")]);
    assert_eq!(
      expand("registry/${COMPANY_NAME}/api:{{SB_ENV}}", &tokens),
      "registry/acme/api:prod"
    );
  }

  #[test]
  fn unresolved_tokens_stay_verbatim() {
    let tokens = tokens(&[("KNOWN", "x")]);
    assert_eq!(
      expand("${UNKNOWN} {{ALSO_UNKNOWN}} ${KNOWN}", &tokens),
      "${UNKNOWN} {{ALSO_UNKNOWN}} x"
    );
  }

  #[test]
  fn plain_strings_pass_through() {
    let tokens = Tokens::new();
    assert_eq!(expand("no tokens here", &tokens), "no tokens here");
  }
}
