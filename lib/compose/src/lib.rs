//! # SwarmBender Compose model
//!
//! A strongly-typed model of the Compose v3 / Swarm subset the
//! render pipeline operates on, with overlay deep-merge semantics
//! and preservation of unknown `x-*` extension keys until the
//! explicit strip stage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod sections;
pub mod service;
pub mod variant;
pub mod visit;

pub use sections::{
  Deploy, FileRef, FileRefLong, Healthcheck, Logging, PortLong,
  PortMapping, RestartPolicy, UpdateConfig, VolumeLong,
  VolumeMount, YamlMap,
};
pub use service::Service;
pub use variant::{
  ExtraHosts, ListOrDict, ListOrString, NetworkAttachment,
  ServiceNetworks, Sysctls, UlimitValue, Ulimits,
};

fn is_false(value: &bool) -> bool {
  !*value
}

/// A top-level `secrets:` entry. The render pipeline only ever
/// emits external secrets.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct SecretDef {
  #[serde(default, skip_serializing_if = "is_false")]
  pub external: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

impl SecretDef {
  pub fn external(name: impl Into<String>) -> SecretDef {
    SecretDef {
      external: true,
      name: Some(name.into()),
      custom: IndexMap::new(),
    }
  }
}

/// The root Compose document.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct ComposeFile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub services: IndexMap<String, Service>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub networks: IndexMap<String, serde_yaml_ng::Value>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub volumes: IndexMap<String, serde_yaml_ng::Value>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub configs: IndexMap<String, serde_yaml_ng::Value>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub secrets: IndexMap<String, SecretDef>,
  /// Unknown root keys (`x-sb`, third-party `x-*`, ...).
  #[serde(flatten)]
  pub custom: YamlMap,
}

/// Shallow value merge for untyped top-level fields: mappings
/// merge key-wise, sequences append, anything else is overwritten
/// when the overlay value is non-null.
fn merge_yaml_value(
  target: &mut serde_yaml_ng::Value,
  overlay: serde_yaml_ng::Value,
) {
  match (&mut *target, overlay) {
    (
      serde_yaml_ng::Value::Mapping(target_map),
      serde_yaml_ng::Value::Mapping(overlay_map),
    ) => {
      for (key, value) in overlay_map {
        target_map.insert(key, value);
      }
    }
    (
      serde_yaml_ng::Value::Sequence(target_seq),
      serde_yaml_ng::Value::Sequence(overlay_seq),
    ) => {
      target_seq.extend(overlay_seq);
    }
    (_, serde_yaml_ng::Value::Null) => {}
    (target, overlay) => *target = overlay,
  }
}

impl ComposeFile {
  /// Apply one overlay document.
  ///
  /// A `"*"` service deep-merges into every concrete service and
  /// never lands in the services map itself. Named overlay
  /// services merge into existing ones or are added verbatim.
  pub fn apply_overlay(&mut self, mut overlay: ComposeFile) {
    if let Some(wildcard) = overlay.services.shift_remove("*") {
      for service in self.services.values_mut() {
        service.merge_from(wildcard.clone());
      }
    }
    for (name, service) in overlay.services {
      match self.services.get_mut(&name) {
        Some(current) => current.merge_from(service),
        None => {
          self.services.insert(name, service);
        }
      }
    }

    if overlay.version.is_some() {
      self.version = overlay.version;
    }
    self.networks.extend(overlay.networks);
    self.volumes.extend(overlay.volumes);
    self.configs.extend(overlay.configs);
    self.secrets.extend(overlay.secrets);
    for (key, value) in overlay.custom {
      match self.custom.get_mut(&key) {
        Some(current) => merge_yaml_value(current, value),
        None => {
          self.custom.insert(key, value);
        }
      }
    }
  }

  /// Remove every `x-sb*` extension key before serialization.
  /// Third-party `x-*` keys are left in place.
  pub fn strip_custom(&mut self) {
    self.custom.retain(|key, _| !key.starts_with("x-sb"));
    for service in self.services.values_mut() {
      service.custom.retain(|key, _| !key.starts_with("x-sb"));
      service.x_sb_groups.clear();
      service.x_sb_secrets.clear();
    }
  }

  /// Visit root-level strings outside of services: external
  /// secret entry names and textual fields, untyped top-level
  /// sections and `x-*` blocks.
  pub fn visit_root_strings_mut(
    &mut self,
    visit_fn: &mut impl FnMut(&mut String),
  ) {
    let secrets = std::mem::take(&mut self.secrets);
    for (mut name, mut def) in secrets {
      visit_fn(&mut name);
      if let Some(secret_name) = def.name.as_mut() {
        visit_fn(secret_name);
      }
      visit::visit_yaml_map_strings_mut(&mut def.custom, visit_fn);
      self.secrets.insert(name, def);
    }
    for section in [
      &mut self.networks,
      &mut self.volumes,
      &mut self.configs,
    ] {
      for value in section.values_mut() {
        visit::visit_value_strings_mut(value, visit_fn);
      }
    }
    visit::visit_yaml_map_strings_mut(&mut self.custom, visit_fn);
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn parse(yaml: &str) -> ComposeFile {
    serde_yaml_ng::from_str(yaml).unwrap()
  }

  #[test]
  fn wildcard_service_applies_to_all_and_disappears() {
    let mut target = parse(
      "services:\n  api:\n    image: a\n  worker:\n    image: b\n",
    );
    let overlay = parse(
      "services:\n  '*':\n    logging:\n      driver: json-file\n",
    );
    target.apply_overlay(overlay);
    assert!(!target.services.contains_key("*"));
    for service in target.services.values() {
      assert_eq!(
        service.logging.as_ref().unwrap().driver.as_deref(),
        Some("json-file")
      );
    }
  }

  #[test]
  fn named_service_wins_over_wildcard_in_same_overlay() {
    let mut target = parse("services:\n  api:\n    image: a\n");
    let overlay = parse(
      "services:\n  '*':\n    environment:\n      FOO: '1'\n  api:\n    environment:\n      FOO: '2'\n",
    );
    target.apply_overlay(overlay);
    let map = target.services["api"].environment_map();
    assert_eq!(map["FOO"], "2");
    assert_eq!(map.len(), 1);
  }

  #[test]
  fn overlay_adds_unknown_services() {
    let mut target = parse("services:\n  api:\n    image: a\n");
    let overlay = parse("services:\n  cron:\n    image: c\n");
    target.apply_overlay(overlay);
    assert!(target.services.contains_key("cron"));
  }

  #[test]
  fn empty_services_overlay_still_merges_top_level() {
    let mut target = parse("services:\n  api:\n    image: a\n");
    let overlay =
      parse("networks:\n  backend:\n    driver: overlay\n");
    target.apply_overlay(overlay);
    assert!(target.networks.contains_key("backend"));
    assert_eq!(target.services.len(), 1);
  }

  #[test]
  fn strip_custom_removes_only_x_sb_keys() {
    let mut target = parse(
      "services:\n  api:\n    image: a\n    x-sb-groups: [web]\nx-sb:\n  labels:\n    a: b\nx-other: keep\n",
    );
    target.strip_custom();
    assert!(!target.custom.contains_key("x-sb"));
    assert!(target.custom.contains_key("x-other"));
    assert!(target.services["api"].x_sb_groups.is_empty());
  }

  #[test]
  fn external_secret_serializes_with_name() {
    let mut target = ComposeFile::default();
    target
      .secrets
      .insert("sb_app_dev_KEY_v1".to_string(), SecretDef::external("sb_app_dev_KEY_v1"));
    let yaml = serde_yaml_ng::to_string(&target).unwrap();
    assert!(yaml.contains("external: true"));
    assert!(yaml.contains("name: sb_app_dev_KEY_v1"));
  }
}
