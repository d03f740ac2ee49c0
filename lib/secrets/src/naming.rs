//! Deterministic external secret naming.
//!
//! `{scope}` expands to `<stackId>_<serviceName>`; a template can
//! opt out of service scoping by using `{stack}` instead.

use config::VersionMode;
use sha2::{Digest, Sha256};

/// Hex prefix length for `content-sha` version tokens.
const SHA_PREFIX_LEN: usize = 12;

pub struct NameParts<'a> {
  pub stack_id: &'a str,
  pub service_name: &'a str,
  pub env: &'a str,
  pub key: &'a str,
}

/// The `{version}` component of an external name.
pub fn version_token(
  mode: VersionMode,
  static_version: &str,
  value: &str,
) -> String {
  match mode {
    VersionMode::ContentSha => {
      let digest = Sha256::digest(value.as_bytes());
      let mut token = hex::encode(digest);
      token.truncate(SHA_PREFIX_LEN);
      token
    }
    VersionMode::Static => static_version.to_string(),
    VersionMode::Timestamp => {
      chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
    }
  }
}

/// Render the external name from the configured template.
pub fn external_name(
  template: &str,
  parts: &NameParts,
  version: &str,
) -> String {
  let scope = if parts.service_name.is_empty() {
    parts.stack_id.to_string()
  } else {
    format!("{}_{}", parts.stack_id, parts.service_name)
  };
  template
    .replace("{scope}", &scope)
    .replace("{stack}", parts.stack_id)
    .replace("{service}", parts.service_name)
    .replace("{env}", parts.env)
    .replace("{key}", parts.key)
    .replace("{version}", version)
}

#[cfg(test)]
mod tests {
  use config::DEFAULT_NAME_TEMPLATE;
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn default_template_renders_spec_shape() {
    let name = external_name(
      DEFAULT_NAME_TEMPLATE,
      &NameParts {
        stack_id: "app",
        service_name: "api",
        env: "dev",
        key: "ConnectionStrings__Main",
      },
      "v1",
    );
    assert_eq!(name, "sb_app_api_dev_ConnectionStrings__Main_v1");
  }

  #[test]
  fn scope_without_service_drops_the_separator() {
    let name = external_name(
      DEFAULT_NAME_TEMPLATE,
      &NameParts {
        stack_id: "app",
        service_name: "",
        env: "dev",
        key: "KEY",
      },
      "v1",
    );
    assert_eq!(name, "sb_app_dev_KEY_v1");
  }

  #[test]
  fn content_sha_is_stable_and_short() {
    let a = version_token(VersionMode::ContentSha, "v1", "value");
    let b = version_token(VersionMode::ContentSha, "v1", "value");
    let c = version_token(VersionMode::ContentSha, "v1", "other");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 12);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    assert_eq!(a, a.to_lowercase());
  }

  #[test]
  fn static_mode_uses_the_literal() {
    assert_eq!(
      version_token(VersionMode::Static, "v7", "ignored"),
      "v7"
    );
  }
}
