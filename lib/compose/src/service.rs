//! The Compose service model and its overlay deep merge.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
  sections::{
    Deploy, FileRef, Healthcheck, Logging, PortMapping, VolumeMount,
    YamlMap,
  },
  variant::{
    ExtraHosts, ListOrDict, ListOrString, ServiceNetworks, Sysctls,
    Ulimits,
  },
};

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct Service {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub working_dir: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stop_signal: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stop_grace_period: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<ListOrString>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entrypoint: Option<ListOrString>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env_file: Option<ListOrString>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dns: Option<ListOrString>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dns_search: Option<ListOrString>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub devices: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tmpfs: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cap_add: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cap_drop: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub profiles: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dns_opt: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub volumes: Vec<VolumeMount>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<PortMapping>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub secrets: Vec<FileRef>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub configs: Vec<FileRef>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub environment: Option<ListOrDict>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub labels: Option<ListOrDict>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extra_hosts: Option<ExtraHosts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ulimits: Option<Ulimits>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sysctls: Option<Sysctls>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logging: Option<Logging>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub healthcheck: Option<Healthcheck>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deploy: Option<Deploy>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub networks: Option<ServiceNetworks>,

  #[serde(
    rename = "x-sb-groups",
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub x_sb_groups: Vec<String>,
  #[serde(
    rename = "x-sb-secrets",
    default,
    skip_serializing_if = "IndexMap::is_empty"
  )]
  pub x_sb_secrets: YamlMap,

  /// Unknown keys, preserved until the strip stage.
  #[serde(flatten)]
  pub custom: YamlMap,
}

fn merge_option<T>(target: &mut Option<T>, overlay: Option<T>) {
  if overlay.is_some() {
    *target = overlay;
  }
}

fn merge_list<T>(target: &mut Vec<T>, overlay: Vec<T>) {
  if !overlay.is_empty() {
    *target = overlay;
  }
}

impl Service {
  /// Deep-merge an overlay service into this one, last-wins when
  /// the overlay side is non-null / non-empty.
  pub fn merge_from(&mut self, overlay: Service) {
    merge_option(&mut self.image, overlay.image);
    merge_option(&mut self.user, overlay.user);
    merge_option(&mut self.working_dir, overlay.working_dir);
    merge_option(&mut self.stop_signal, overlay.stop_signal);
    merge_option(
      &mut self.stop_grace_period,
      overlay.stop_grace_period,
    );

    merge_option(&mut self.command, overlay.command);
    merge_option(&mut self.entrypoint, overlay.entrypoint);
    merge_option(&mut self.env_file, overlay.env_file);
    merge_option(&mut self.dns, overlay.dns);
    merge_option(&mut self.dns_search, overlay.dns_search);

    merge_list(&mut self.devices, overlay.devices);
    merge_list(&mut self.tmpfs, overlay.tmpfs);
    merge_list(&mut self.cap_add, overlay.cap_add);
    merge_list(&mut self.cap_drop, overlay.cap_drop);
    merge_list(&mut self.profiles, overlay.profiles);
    merge_list(&mut self.dns_opt, overlay.dns_opt);
    merge_list(&mut self.volumes, overlay.volumes);
    merge_list(&mut self.ports, overlay.ports);
    merge_list(&mut self.secrets, overlay.secrets);
    merge_list(&mut self.configs, overlay.configs);

    if let Some(environment) = overlay.environment {
      match self.environment.as_mut() {
        Some(current) => current.merge_from(environment),
        None => self.environment = Some(environment),
      }
    }
    if let Some(labels) = overlay.labels {
      match self.labels.as_mut() {
        Some(current) => current.merge_from(labels),
        None => self.labels = Some(labels),
      }
    }
    if let Some(extra_hosts) = overlay.extra_hosts {
      match self.extra_hosts.as_mut() {
        Some(current) => current.merge_from(extra_hosts),
        None => self.extra_hosts = Some(extra_hosts),
      }
    }
    if let Some(ulimits) = overlay.ulimits {
      match self.ulimits.as_mut() {
        Some(current) => current.merge_from(ulimits),
        None => self.ulimits = Some(ulimits),
      }
    }
    if let Some(sysctls) = overlay.sysctls {
      match self.sysctls.as_mut() {
        Some(current) => current.merge_from(sysctls),
        None => self.sysctls = Some(sysctls),
      }
    }
    if let Some(logging) = overlay.logging {
      match self.logging.as_mut() {
        Some(current) => current.merge_from(logging),
        None => self.logging = Some(logging),
      }
    }
    if let Some(healthcheck) = overlay.healthcheck {
      match self.healthcheck.as_mut() {
        Some(current) => current.merge_from(healthcheck),
        None => self.healthcheck = Some(healthcheck),
      }
    }
    if let Some(deploy) = overlay.deploy {
      match self.deploy.as_mut() {
        Some(current) => current.merge_from(deploy),
        None => self.deploy = Some(deploy),
      }
    }
    if let Some(networks) = overlay.networks {
      match self.networks.as_mut() {
        Some(current) => current.merge_from(networks),
        None => self.networks = Some(networks),
      }
    }

    self.x_sb_groups.extend(overlay.x_sb_groups);
    self.x_sb_secrets.extend(overlay.x_sb_secrets);
    self.custom.extend(overlay.custom);
  }

  /// Replace the environment with the given map form.
  pub fn set_environment_map(
    &mut self,
    map: IndexMap<String, String>,
  ) {
    self.environment = Some(ListOrDict::Dict(map));
  }

  pub fn environment_map(&self) -> IndexMap<String, String> {
    self
      .environment
      .as_ref()
      .map(ListOrDict::to_map)
      .unwrap_or_default()
  }

  /// Drop duplicate secret references, keeping the first per
  /// `source`.
  pub fn dedupe_secret_refs(&mut self) {
    let mut seen = Vec::new();
    self.secrets.retain(|secret| {
      let source = secret.source().to_string();
      if seen.contains(&source) {
        false
      } else {
        seen.push(source);
        true
      }
    });
  }

  /// Visit every scalar string a token may expand in.
  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    for field in [
      &mut self.image,
      &mut self.user,
      &mut self.working_dir,
      &mut self.stop_signal,
      &mut self.stop_grace_period,
    ] {
      if let Some(value) = field.as_mut() {
        visit(value);
      }
    }
    for field in [
      &mut self.command,
      &mut self.entrypoint,
      &mut self.env_file,
      &mut self.dns,
      &mut self.dns_search,
    ] {
      if let Some(value) = field.as_mut() {
        value.visit_strings_mut(visit);
      }
    }
    for list in [
      &mut self.devices,
      &mut self.tmpfs,
      &mut self.cap_add,
      &mut self.cap_drop,
      &mut self.profiles,
      &mut self.dns_opt,
    ] {
      list.iter_mut().for_each(&mut *visit);
    }
    for volume in &mut self.volumes {
      volume.visit_strings_mut(visit);
    }
    for port in &mut self.ports {
      port.visit_strings_mut(visit);
    }
    for secret in &mut self.secrets {
      secret.visit_strings_mut(visit);
    }
    for config in &mut self.configs {
      config.visit_strings_mut(visit);
    }
    if let Some(environment) = self.environment.as_mut() {
      environment.visit_strings_mut(visit);
    }
    if let Some(labels) = self.labels.as_mut() {
      labels.visit_strings_mut(visit);
    }
    if let Some(extra_hosts) = self.extra_hosts.as_mut() {
      extra_hosts.visit_strings_mut(visit);
    }
    if let Some(logging) = self.logging.as_mut() {
      logging.visit_strings_mut(visit);
    }
    if let Some(healthcheck) = self.healthcheck.as_mut() {
      healthcheck.visit_strings_mut(visit);
    }
    if let Some(deploy) = self.deploy.as_mut()
      && let Some(labels) = deploy.labels.as_mut()
    {
      labels.visit_strings_mut(visit);
    }
    if let Some(networks) = self.networks.as_mut() {
      networks.visit_strings_mut(visit);
    }
    crate::visit::visit_yaml_map_strings_mut(
      &mut self.custom,
      visit,
    );
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn service(yaml: &str) -> Service {
    serde_yaml_ng::from_str(yaml).unwrap()
  }

  #[test]
  fn scalar_overlay_wins_when_set() {
    let mut target = service("image: alpine:3.19\nuser: root\n");
    target.merge_from(service("image: alpine:3.20\n"));
    assert_eq!(target.image.as_deref(), Some("alpine:3.20"));
    assert_eq!(target.user.as_deref(), Some("root"));
  }

  #[test]
  fn empty_overlay_list_does_not_clear_target() {
    let mut target = service("cap_add: [NET_ADMIN]\n");
    target.merge_from(service("image: alpine\n"));
    assert_eq!(target.cap_add, vec!["NET_ADMIN".to_string()]);
  }

  #[test]
  fn nonempty_overlay_list_replaces_target() {
    let mut target = service("ports: ['80:80']\n");
    target.merge_from(service("ports: ['443:443']\n"));
    assert_eq!(
      target.ports,
      vec![crate::sections::PortMapping::Short(
        "443:443".to_string()
      )]
    );
  }

  #[test]
  fn environment_maps_merge_key_wise() {
    let mut target = service("environment:\n  A: '1'\n  B: '2'\n");
    target.merge_from(service("environment:\n  B: '9'\n  C: '3'\n"));
    let map = target.environment_map();
    assert_eq!(map["A"], "1");
    assert_eq!(map["B"], "9");
    assert_eq!(map["C"], "3");
  }

  #[test]
  fn x_sb_fields_concat_and_merge() {
    let mut target = service("x-sb-groups: [base]\n");
    target.merge_from(service("x-sb-groups: [web]\n"));
    assert_eq!(
      target.x_sb_groups,
      vec!["base".to_string(), "web".to_string()]
    );
  }

  #[test]
  fn dedupe_secret_refs_keeps_first_per_source() {
    let mut target = service(
      "secrets:\n  - a\n  - source: a\n    target: A\n  - b\n",
    );
    target.dedupe_secret_refs();
    let sources = target
      .secrets
      .iter()
      .map(|s| s.source().to_string())
      .collect::<Vec<_>>();
    assert_eq!(sources, vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn unknown_keys_are_preserved_in_custom() {
    let target = service("image: alpine\nx-sb:\n  labels:\n    a: b\nisolation: default\n");
    assert!(target.custom.contains_key("x-sb"));
    assert!(target.custom.contains_key("isolation"));
  }
}
