//! # SwarmBender environment bag
//!
//! The flat `KEY -> value` mapping every render aggregates into.
//! Keys use `__` as the canonical path separator; during
//! aggregation the dotted twin (`A.B.C`) of a key is kept
//! alongside the canonical form until the secretize stage
//! collapses the pair.

use indexmap::IndexMap;

pub type EnvBag = IndexMap<String, String>;

/// Canonical form of an env key: `.` separators become `__`.
pub fn to_canon(key: &str) -> String {
  key.replace('.', "__")
}

/// Insert a value under both the dotted and canonical form of
/// `key`. Last write wins per form.
pub fn insert_dual(bag: &mut EnvBag, key: &str, value: &str) {
  let canon = to_canon(key);
  if canon != key {
    bag.insert(key.to_string(), value.to_string());
  }
  bag.insert(canon, value.to_string());
}

/// Collapse dotted / canonical twins into canonical-only keys.
/// When both forms are present the `__` form wins; a lone dotted
/// key is renamed to its canonical form.
pub fn collapse_dual(map: &EnvBag) -> EnvBag {
  let mut out = EnvBag::new();
  for (key, value) in map {
    let canon = to_canon(key);
    if canon != *key && map.contains_key(&canon) {
      continue;
    }
    out.insert(canon, value.clone());
  }
  out
}

/// Render a JSON leaf in invariant form. Null renders as the
/// empty string, matching Compose's treatment of unset values.
fn leaf_string(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Bool(b) => b.to_string(),
    serde_json::Value::Number(n) => n.to_string(),
    serde_json::Value::Null => String::new(),
    // flatten() never passes composites here
    other => other.to_string(),
  }
}

fn flatten_into(
  prefix: &str,
  value: &serde_json::Value,
  out: &mut Vec<(String, String)>,
) {
  match value {
    serde_json::Value::Object(map) => {
      for (key, value) in map {
        let path = if prefix.is_empty() {
          key.clone()
        } else {
          format!("{prefix}__{key}")
        };
        flatten_into(&path, value, out);
      }
    }
    serde_json::Value::Array(items) => {
      for (index, value) in items.iter().enumerate() {
        let path = if prefix.is_empty() {
          index.to_string()
        } else {
          format!("{prefix}__{index}")
        };
        flatten_into(&path, value, out);
      }
    }
    leaf => {
      out.push((prefix.to_string(), leaf_string(leaf)));
    }
  }
}

/// Flatten a JSON document into `A__B__C` keyed leaves. Arrays
/// flatten by index.
pub fn flatten(
  value: &serde_json::Value,
) -> Vec<(String, String)> {
  let mut out = Vec::new();
  flatten_into("", value, &mut out);
  out
}

/// Rebuild nested JSON from canonical `A__B__C` keys. Numeric
/// path segments become object keys, not array indices.
pub fn unflatten(map: &EnvBag) -> serde_json::Value {
  let mut root = serde_json::Map::new();
  for (key, value) in map {
    let mut node = &mut root;
    let segments = key.split("__").collect::<Vec<_>>();
    let (leaf, path) = match segments.split_last() {
      Some(split) => split,
      None => continue,
    };
    for segment in path {
      let entry = node
        .entry(segment.to_string())
        .or_insert_with(|| {
          serde_json::Value::Object(serde_json::Map::new())
        });
      // A scalar in the way of a deeper path is demoted to an
      // object, matching last-wins aggregation.
      if !entry.is_object() {
        *entry = serde_json::Value::Object(serde_json::Map::new());
      }
      node = entry
        .as_object_mut()
        .expect("entry was just ensured to be an object");
    }
    node.insert(
      leaf.to_string(),
      serde_json::Value::String(value.clone()),
    );
  }
  serde_json::Value::Object(root)
}
