//! Variant scalar containers modeling YAML's polymorphism.
//!
//! Compose allows many fields to be written either as a scalar,
//! a sequence, or a mapping. Each container here is a tagged sum
//! type holding exactly one populated variant.

use indexmap::IndexMap;
use serde::{
  Deserialize, Deserializer, Serialize,
  de::{self, MapAccess, SeqAccess, Visitor},
};

/// Coerce a YAML scalar into its string form.
///
/// Numbers and booleans keep their literal rendering, null becomes
/// the empty string. Non-scalar values fall back to their YAML
/// rendering with the trailing newline removed.
pub fn scalar_string(value: serde_yaml_ng::Value) -> String {
  match value {
    serde_yaml_ng::Value::String(s) => s,
    serde_yaml_ng::Value::Bool(b) => b.to_string(),
    serde_yaml_ng::Value::Number(n) => n.to_string(),
    serde_yaml_ng::Value::Null => String::new(),
    other => serde_yaml_ng::to_string(&other)
      .unwrap_or_default()
      .trim_end()
      .to_string(),
  }
}

/// Either an ordered list of strings or a single string.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListOrString {
  List(Vec<String>),
  String(String),
}

impl ListOrString {
  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      ListOrString::List(items) => {
        items.iter_mut().for_each(&mut *visit)
      }
      ListOrString::String(s) => visit(s),
    }
  }
}

impl<'de> Deserialize<'de> for ListOrString {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    match value {
      serde_yaml_ng::Value::Sequence(items) => {
        Ok(ListOrString::List(
          items.into_iter().map(scalar_string).collect(),
        ))
      }
      serde_yaml_ng::Value::Mapping(_) => Err(de::Error::custom(
        "expected string or list of strings, got mapping",
      )),
      scalar => Ok(ListOrString::String(scalar_string(scalar))),
    }
  }
}

/// Either an ordered list of `KEY` / `KEY=VALUE` strings or a
/// mapping from string to string.
///
/// Used for `environment` and `labels`, and as the shape for
/// `deploy.labels`. Scalar map values (numbers, bools, null) are
/// coerced to strings at parse time.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListOrDict {
  List(Vec<String>),
  Dict(IndexMap<String, String>),
}

impl Default for ListOrDict {
  fn default() -> ListOrDict {
    ListOrDict::Dict(IndexMap::new())
  }
}

impl ListOrDict {
  pub fn is_empty(&self) -> bool {
    match self {
      ListOrDict::List(items) => items.is_empty(),
      ListOrDict::Dict(map) => map.is_empty(),
    }
  }

  /// Convert to map form, splitting `KEY=VALUE` items. A bare
  /// `KEY` maps to the empty string. Later items win.
  pub fn to_map(&self) -> IndexMap<String, String> {
    match self {
      ListOrDict::Dict(map) => map.clone(),
      ListOrDict::List(items) => {
        let mut map = IndexMap::new();
        for item in items {
          match item.split_once('=') {
            Some((key, value)) => {
              map.insert(key.to_string(), value.to_string())
            }
            None => map.insert(item.clone(), String::new()),
          };
        }
        map
      }
    }
  }

  /// Deterministic `KEY=value` list, ASCII-sorted by key.
  pub fn to_sorted_list(&self) -> Vec<String> {
    let map = self.to_map();
    let mut keys = map.keys().cloned().collect::<Vec<_>>();
    keys.sort();
    keys
      .into_iter()
      .map(|key| {
        let value = &map[&key];
        format!("{key}={value}")
      })
      .collect()
  }

  /// Overlay merge: map-on-map merges key-wise, list-on-list
  /// appends, mixed forms are replaced by the overlay.
  pub fn merge_from(&mut self, overlay: ListOrDict) {
    match (&mut *self, overlay) {
      (ListOrDict::Dict(target), ListOrDict::Dict(source)) => {
        target.extend(source);
      }
      (ListOrDict::List(target), ListOrDict::List(source)) => {
        target.extend(source);
      }
      (target, source) => *target = source,
    }
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      ListOrDict::List(items) => {
        items.iter_mut().for_each(&mut *visit)
      }
      ListOrDict::Dict(map) => {
        let entries = std::mem::take(map);
        for (mut key, mut value) in entries {
          visit(&mut key);
          visit(&mut value);
          map.insert(key, value);
        }
      }
    }
  }
}

impl<'de> Deserialize<'de> for ListOrDict {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    deserializer.deserialize_any(ListOrDictVisitor)
  }
}

struct ListOrDictVisitor;

impl<'de> Visitor<'de> for ListOrDictVisitor {
  type Value = ListOrDict;

  fn expecting(
    &self,
    formatter: &mut std::fmt::Formatter,
  ) -> std::fmt::Result {
    formatter
      .write_str("a list of strings or a map of string to string")
  }

  fn visit_seq<A: SeqAccess<'de>>(
    self,
    mut seq: A,
  ) -> Result<Self::Value, A::Error> {
    let mut items = Vec::new();
    while let Some(value) =
      seq.next_element::<serde_yaml_ng::Value>()?
    {
      items.push(scalar_string(value));
    }
    Ok(ListOrDict::List(items))
  }

  fn visit_map<A: MapAccess<'de>>(
    self,
    mut map: A,
  ) -> Result<Self::Value, A::Error> {
    let mut entries = IndexMap::new();
    while let Some((key, value)) =
      map.next_entry::<String, serde_yaml_ng::Value>()?
    {
      entries.insert(key, scalar_string(value));
    }
    Ok(ListOrDict::Dict(entries))
  }
}

/// `extra_hosts`: list of `HOST:IP` strings or host → ip mapping.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ExtraHosts {
  List(Vec<String>),
  Map(IndexMap<String, String>),
}

impl ExtraHosts {
  pub fn merge_from(&mut self, overlay: ExtraHosts) {
    match (&mut *self, overlay) {
      (ExtraHosts::Map(target), ExtraHosts::Map(source)) => {
        target.extend(source);
      }
      (ExtraHosts::List(target), ExtraHosts::List(source)) => {
        target.extend(source);
      }
      (target, source) => *target = source,
    }
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      ExtraHosts::List(items) => {
        items.iter_mut().for_each(&mut *visit)
      }
      ExtraHosts::Map(map) => {
        let entries = std::mem::take(map);
        for (mut key, mut value) in entries {
          visit(&mut key);
          visit(&mut value);
          map.insert(key, value);
        }
      }
    }
  }
}

impl<'de> Deserialize<'de> for ExtraHosts {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    match ListOrDict::deserialize(deserializer)? {
      ListOrDict::List(items) => Ok(ExtraHosts::List(items)),
      ListOrDict::Dict(map) => Ok(ExtraHosts::Map(map)),
    }
  }
}

/// A single ulimit: bare number or `{soft, hard}` object.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum UlimitValue {
  Single(i64),
  SoftHard {
    #[serde(skip_serializing_if = "Option::is_none")]
    soft: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hard: Option<i64>,
  },
}

impl UlimitValue {
  /// Object-on-object merges `soft` / `hard` field-wise, any other
  /// combination is replaced by the overlay.
  pub fn merge_from(&mut self, overlay: UlimitValue) {
    match (&mut *self, overlay) {
      (
        UlimitValue::SoftHard { soft, hard },
        UlimitValue::SoftHard {
          soft: overlay_soft,
          hard: overlay_hard,
        },
      ) => {
        if overlay_soft.is_some() {
          *soft = overlay_soft;
        }
        if overlay_hard.is_some() {
          *hard = overlay_hard;
        }
      }
      (target, source) => *target = source,
    }
  }
}

/// `ulimits`: name → limit mapping, or the legacy list form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Ulimits {
  Map(IndexMap<String, UlimitValue>),
  List(Vec<String>),
}

impl Ulimits {
  pub fn merge_from(&mut self, overlay: Ulimits) {
    match (&mut *self, overlay) {
      (Ulimits::Map(target), Ulimits::Map(source)) => {
        for (key, value) in source {
          match target.get_mut(&key) {
            Some(current) => current.merge_from(value),
            None => {
              target.insert(key, value);
            }
          }
        }
      }
      (Ulimits::List(target), Ulimits::List(source)) => {
        target.extend(source);
      }
      (target, source) => *target = source,
    }
  }
}

/// `sysctls`: list of `KEY=VALUE` strings or key → value mapping.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Sysctls {
  List(Vec<String>),
  Map(IndexMap<String, String>),
}

impl Sysctls {
  pub fn merge_from(&mut self, overlay: Sysctls) {
    match (&mut *self, overlay) {
      (Sysctls::Map(target), Sysctls::Map(source)) => {
        target.extend(source);
      }
      (Sysctls::List(target), Sysctls::List(source)) => {
        target.extend(source);
      }
      (target, source) => *target = source,
    }
  }
}

impl<'de> Deserialize<'de> for Sysctls {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    match ListOrDict::deserialize(deserializer)? {
      ListOrDict::List(items) => Ok(Sysctls::List(items)),
      ListOrDict::Dict(map) => Ok(Sysctls::Map(map)),
    }
  }
}

/// Per-attachment network options.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct NetworkAttachment {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub aliases: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ipv4_address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ipv6_address: Option<String>,
  #[serde(flatten)]
  pub custom: IndexMap<String, serde_yaml_ng::Value>,
}

impl NetworkAttachment {
  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    self.aliases.iter_mut().for_each(&mut *visit);
    if let Some(addr) = self.ipv4_address.as_mut() {
      visit(addr);
    }
    if let Some(addr) = self.ipv6_address.as_mut() {
      visit(addr);
    }
  }
}

/// `networks` on a service: list of names or name → attachment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServiceNetworks {
  List(Vec<String>),
  Map(IndexMap<String, Option<NetworkAttachment>>),
}

impl ServiceNetworks {
  /// Map-on-map merges keys, list-on-list union-appends with
  /// case-insensitive dedup, mixed forms are replaced.
  pub fn merge_from(&mut self, overlay: ServiceNetworks) {
    match (&mut *self, overlay) {
      (
        ServiceNetworks::Map(target),
        ServiceNetworks::Map(source),
      ) => {
        target.extend(source);
      }
      (
        ServiceNetworks::List(target),
        ServiceNetworks::List(source),
      ) => {
        for name in source {
          let seen = target
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&name));
          if !seen {
            target.push(name);
          }
        }
      }
      (target, source) => *target = source,
    }
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      ServiceNetworks::List(items) => {
        items.iter_mut().for_each(&mut *visit)
      }
      ServiceNetworks::Map(map) => {
        for attachment in map.values_mut().flatten() {
          attachment.visit_strings_mut(visit);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn list_or_string_parses_both_forms() {
    let single: ListOrString =
      serde_yaml_ng::from_str("sh -c 'sleep 1'").unwrap();
    assert_eq!(
      single,
      ListOrString::String("sh -c 'sleep 1'".to_string())
    );
    let list: ListOrString =
      serde_yaml_ng::from_str("[sh, -c, sleep 1]").unwrap();
    assert_eq!(
      list,
      ListOrString::List(vec![
        "sh".to_string(),
        "-c".to_string(),
        "sleep 1".to_string()
      ])
    );
  }

  #[test]
  fn list_or_dict_coerces_scalar_values() {
    let parsed: ListOrDict = serde_yaml_ng::from_str(
      "PORT: 8080\nDEBUG: true\nEMPTY: null\n",
    )
    .unwrap();
    let map = parsed.to_map();
    assert_eq!(map["PORT"], "8080");
    assert_eq!(map["DEBUG"], "true");
    assert_eq!(map["EMPTY"], "");
  }

  #[test]
  fn list_or_dict_list_to_map_splits_on_first_equals() {
    let parsed = ListOrDict::List(vec![
      "A=1".to_string(),
      "B=x=y".to_string(),
      "BARE".to_string(),
    ]);
    let map = parsed.to_map();
    assert_eq!(map["A"], "1");
    assert_eq!(map["B"], "x=y");
    assert_eq!(map["BARE"], "");
  }

  #[test]
  fn list_or_dict_sorted_list_is_ascii_ordered() {
    let mut map = IndexMap::new();
    map.insert("b".to_string(), "2".to_string());
    map.insert("A".to_string(), "1".to_string());
    let sorted = ListOrDict::Dict(map).to_sorted_list();
    assert_eq!(sorted, vec!["A=1".to_string(), "b=2".to_string()]);
  }

  #[test]
  fn list_or_dict_mixed_merge_overlay_wins() {
    let mut target = ListOrDict::List(vec!["A=1".to_string()]);
    let mut overlay_map = IndexMap::new();
    overlay_map.insert("B".to_string(), "2".to_string());
    target.merge_from(ListOrDict::Dict(overlay_map.clone()));
    assert_eq!(target, ListOrDict::Dict(overlay_map));
  }

  #[test]
  fn ulimit_object_merge_is_field_wise() {
    let mut target = UlimitValue::SoftHard {
      soft: Some(100),
      hard: Some(200),
    };
    target.merge_from(UlimitValue::SoftHard {
      soft: None,
      hard: Some(500),
    });
    assert_eq!(
      target,
      UlimitValue::SoftHard {
        soft: Some(100),
        hard: Some(500),
      }
    );
  }

  #[test]
  fn service_networks_list_union_is_case_insensitive() {
    let mut target = ServiceNetworks::List(vec![
      "Frontend".to_string(),
      "backend".to_string(),
    ]);
    target.merge_from(ServiceNetworks::List(vec![
      "frontend".to_string(),
      "metrics".to_string(),
    ]));
    assert_eq!(
      target,
      ServiceNetworks::List(vec![
        "Frontend".to_string(),
        "backend".to_string(),
        "metrics".to_string(),
      ])
    );
  }
}
