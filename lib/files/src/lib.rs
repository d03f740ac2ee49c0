//! # SwarmBender file I/O
//!
//! Glob-aware reads over a repository root with deterministic
//! ordering, plus YAML / JSON parsing that keeps the offending
//! file path attached to every error.

use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

mod error;

pub use error::Error;

pub type Result<T> = ::core::result::Result<T, Error>;

/// The `y?(a)ml` sentinel accepted in overlay / group patterns.
const YAML_SENTINEL: &str = "y?(a)ml";

/// Resolve `{stackId}` / `{env}` placeholders in a pattern.
pub fn resolve_placeholders(
  pattern: &str,
  stack_id: &str,
  env: &str,
) -> String {
  pattern
    .replace("{stackId}", stack_id)
    .replace("{env}", env)
}

fn has_wildcards(segment: &str) -> bool {
  segment.contains('*') || segment.contains('?')
}

/// Expand the `y?(a)ml` extension sentinel, which would otherwise
/// be read as wildcard syntax.
fn expand_sentinel(pattern: &str) -> Vec<String> {
  if pattern.contains(YAML_SENTINEL) {
    vec![
      pattern.replace(YAML_SENTINEL, "yml"),
      pattern.replace(YAML_SENTINEL, "yaml"),
    ]
  } else {
    vec![pattern.to_string()]
  }
}

fn match_segment(
  dirs: Vec<PathBuf>,
  segment: &str,
) -> Vec<PathBuf> {
  if !has_wildcards(segment) {
    return dirs
      .into_iter()
      .map(|dir| dir.join(segment))
      .filter(|path| path.exists())
      .collect();
  }
  let Ok(matcher) = wildcard::Wildcard::new(segment.as_bytes())
  else {
    return Vec::new();
  };
  let mut out = Vec::new();
  for dir in dirs {
    let Ok(read_dir) = fs::read_dir(&dir) else {
      continue;
    };
    for entry in read_dir.flatten() {
      let name = entry.file_name();
      let Some(name) = name.to_str() else {
        continue;
      };
      if matcher.is_match(name.as_bytes()) {
        out.push(entry.path());
      }
    }
  }
  out
}

/// Find files under `root` matching a `/`-separated pattern.
/// Wildcards (`*`, `?`) never cross path separators. The result
/// is ASCII-sorted and deduplicated across the sentinel
/// expansion.
pub fn glob_files(root: &Path, pattern: &str) -> Vec<PathBuf> {
  let mut out = Vec::new();
  for pattern in expand_sentinel(pattern) {
    let mut matches = vec![root.to_path_buf()];
    for segment in
      pattern.split('/').filter(|segment| !segment.is_empty())
    {
      matches = match_segment(matches, segment);
      if matches.is_empty() {
        break;
      }
    }
    out.extend(matches.into_iter().filter(|path| path.is_file()));
  }
  out.sort();
  out.dedup();
  out
}

fn read_to_string(path: &Path) -> Result<String> {
  fs::read_to_string(path).map_err(|e| Error::Io {
    e,
    path: path.to_path_buf(),
  })
}

/// Parse a YAML file into `T`.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = read_to_string(path)?;
  serde_yaml_ng::from_str(&contents).map_err(|e| {
    Error::InvalidYaml {
      e,
      path: path.to_path_buf(),
    }
  })
}

/// Parse a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = read_to_string(path)?;
  serde_json::from_str(&contents).map_err(|e| {
    Error::InvalidJson {
      e,
      path: path.to_path_buf(),
    }
  })
}

/// Write `contents`, creating parent directories and replacing
/// the destination with an atomic rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| Error::Io {
      e,
      path: parent.to_path_buf(),
    })?;
  }
  let tmp = path.with_extension("tmp");
  fs::write(&tmp, contents).map_err(|e| Error::Io {
    e,
    path: tmp.clone(),
  })?;
  fs::rename(&tmp, path).map_err(|e| Error::Io {
    e,
    path: path.to_path_buf(),
  })
}
