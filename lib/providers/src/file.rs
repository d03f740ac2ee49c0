//! File provider: flattens `appsettings`-style JSON files into
//! the env bag. Runs as its own pipeline stage before the rest of
//! the provider chain; malformed JSON is fatal.

use std::path::Path;

use config::FileProviderConfig;
use environment::EnvBag;
use tracing::debug;

const ENV_JSON_PATTERNS: [&str; 3] = [
  "stacks/all/common/env/*.json",
  "stacks/all/{env}/env/*.json",
  "stacks/{stackId}/{env}/env/*.json",
];

/// Collect env JSON in precedence order, last write wins.
pub fn collect(
  config: &FileProviderConfig,
  root: &Path,
  stack_id: &str,
  env_name: &str,
  bag: &mut EnvBag,
) -> files::Result<()> {
  let mut patterns = ENV_JSON_PATTERNS
    .iter()
    .map(|pattern| pattern.to_string())
    .collect::<Vec<_>>();
  patterns.extend(
    config
      .extra_json_dirs
      .iter()
      .map(|dir| format!("{}/*.json", dir.trim_end_matches('/'))),
  );

  for pattern in patterns {
    let resolved =
      files::resolve_placeholders(&pattern, stack_id, env_name);
    for path in files::glob_files(root, &resolved) {
      let value: serde_json::Value = files::read_json(&path)?;
      debug!("env json {} merged", path.display());
      for (key, entry) in environment::flatten(&value) {
        environment::insert_dual(bag, &key, &entry);
      }
    }
  }
  Ok(())
}
