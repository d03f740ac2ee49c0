//! Key shaping shared by the remote adapters: string-replace map,
//! canonicalization back to the Compose `__` convention, and the
//! optional `include` wildcard filter.

use indexmap::IndexMap;

/// Apply an adapter's replace map, re-canonicalize (`.` to `__`)
/// and filter against `include` wildcards. Returns `None` when
/// the key is filtered out.
pub fn shape(
  raw: &str,
  replace: &IndexMap<String, String>,
  include: &[String],
) -> Option<String> {
  let mut key = raw.to_string();
  for (from, to) in replace {
    key = key.replace(from.as_str(), to.as_str());
  }
  let key = environment::to_canon(&key);
  if include.is_empty() {
    return Some(key);
  }
  let included = include.iter().any(|pattern| {
    wildcard::Wildcard::new(pattern.as_bytes())
      .map(|wc| wc.is_match(key.as_bytes()))
      .unwrap_or(false)
  });
  included.then_some(key)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replace_then_canonicalize() {
    let mut replace = IndexMap::new();
    replace.insert("--".to_string(), "__".to_string());
    let shaped =
      shape("ConnectionStrings--Main", &replace, &[]).unwrap();
    assert_eq!(shaped, "ConnectionStrings__Main");
  }

  #[test]
  fn dotted_keys_are_recanonicalized() {
    let shaped =
      shape("Logging.LogLevel.Default", &IndexMap::new(), &[])
        .unwrap();
    assert_eq!(shaped, "Logging__LogLevel__Default");
  }

  #[test]
  fn include_filter_is_first_match_wins() {
    let include = vec!["ConnectionStrings__*".to_string()];
    assert!(
      shape("ConnectionStrings__Main", &IndexMap::new(), &include)
        .is_some()
    );
    assert!(
      shape("Unrelated__Key", &IndexMap::new(), &include).is_none()
    );
  }
}
