//! Process-environment provider. Only variables matching an
//! allowlist wildcard are pulled into the bag.

use std::path::Path;

use config::EnvProviderConfig;
use environment::EnvBag;
use tracing::warn;

/// Load allowlist patterns by globbing each configured search
/// entry and union-ing the JSON string arrays inside.
fn load_allowlist(
  config: &EnvProviderConfig,
  root: &Path,
  stack_id: &str,
  env_name: &str,
  warnings: &mut Vec<String>,
) -> Vec<String> {
  let mut patterns = Vec::new();
  for entry in &config.allowlist_file_search {
    let resolved =
      files::resolve_placeholders(entry, stack_id, env_name);
    let matched = files::glob_files(root, &resolved);
    if matched.is_empty() {
      warn!("allowlist file missing for pattern '{resolved}'");
      warnings.push(format!(
        "allowlist file missing for pattern '{resolved}'"
      ));
      continue;
    }
    for path in matched {
      match files::read_json::<Vec<String>>(&path) {
        Ok(entries) => patterns.extend(entries),
        Err(e) => {
          warn!("allowlist file skipped | {e}");
          warnings.push(format!("allowlist file skipped: {e}"));
        }
      }
    }
  }
  patterns
}

/// Merge matching process env vars into the bag, last-wins.
/// Variable names are visited in ASCII order so repeated renders
/// agree on the outcome.
pub fn collect(
  config: &EnvProviderConfig,
  root: &Path,
  stack_id: &str,
  env_name: &str,
  bag: &mut EnvBag,
  warnings: &mut Vec<String>,
) {
  let patterns =
    load_allowlist(config, root, stack_id, env_name, warnings);
  if patterns.is_empty() {
    return;
  }
  let matchers = patterns
    .iter()
    .filter_map(|pattern| {
      match wildcard::Wildcard::new(pattern.as_bytes()) {
        Ok(wc) => Some(wc),
        Err(e) => {
          warn!("invalid allowlist wildcard '{pattern}' | {e:?}");
          None
        }
      }
    })
    .collect::<Vec<_>>();

  let mut vars = std::env::vars().collect::<Vec<_>>();
  vars.sort();
  for (name, value) in vars {
    if matchers.iter().any(|wc| wc.is_match(name.as_bytes())) {
      environment::insert_dual(bag, &name, &value);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn allowlisted_vars_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("stacks/all")).unwrap();
    fs::write(
      root.join("stacks/all/use-envvars.json"),
      r#"["SB_TEST_ALLOW_*"]"#,
    )
    .unwrap();

    // process-wide, kept unique to this test
    unsafe {
      std::env::set_var("SB_TEST_ALLOW_ME", "yes");
      std::env::set_var("SB_TEST_DENY_ME", "no");
    }

    let config = EnvProviderConfig {
      allowlist_file_search: vec![
        "stacks/all/use-envvars.json".to_string(),
      ],
    };
    let mut bag = EnvBag::new();
    let mut warnings = Vec::new();
    collect(&config, root, "app", "dev", &mut bag, &mut warnings);
    assert_eq!(bag.get("SB_TEST_ALLOW_ME").unwrap(), "yes");
    assert!(!bag.contains_key("SB_TEST_DENY_ME"));
    assert!(warnings.is_empty());
  }

  #[test]
  fn missing_allowlist_warns_but_does_not_fail() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnvProviderConfig {
      allowlist_file_search: vec![
        "stacks/{stackId}/use-envvars.json".to_string(),
      ],
    };
    let mut bag = EnvBag::new();
    let mut warnings = Vec::new();
    collect(
      &config,
      dir.path(),
      "app",
      "dev",
      &mut bag,
      &mut warnings,
    );
    assert!(bag.is_empty());
    assert_eq!(warnings.len(), 1);
  }
}
