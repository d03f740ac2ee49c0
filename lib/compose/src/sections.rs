//! Nested service sections: logging, healthcheck, deploy, and the
//! short-or-long mount / port / file reference shapes.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::variant::{ListOrDict, ListOrString, scalar_string};

pub type YamlMap = IndexMap<String, serde_yaml_ng::Value>;

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct Logging {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub driver: Option<String>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub options: IndexMap<String, String>,
}

impl Logging {
  /// Field-wise overwrite for `driver`, key-wise merge for
  /// `options`.
  pub fn merge_from(&mut self, overlay: Logging) {
    if overlay.driver.is_some() {
      self.driver = overlay.driver;
    }
    self.options.extend(overlay.options);
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    if let Some(driver) = self.driver.as_mut() {
      visit(driver);
    }
    let options = std::mem::take(&mut self.options);
    for (mut key, mut value) in options {
      visit(&mut key);
      visit(&mut value);
      self.options.insert(key, value);
    }
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct Healthcheck {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test: Option<ListOrString>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interval: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_period: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retries: Option<i64>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

impl Healthcheck {
  pub fn merge_from(&mut self, overlay: Healthcheck) {
    if overlay.test.is_some() {
      self.test = overlay.test;
    }
    if overlay.interval.is_some() {
      self.interval = overlay.interval;
    }
    if overlay.timeout.is_some() {
      self.timeout = overlay.timeout;
    }
    if overlay.start_period.is_some() {
      self.start_period = overlay.start_period;
    }
    if overlay.retries.is_some() {
      self.retries = overlay.retries;
    }
    self.custom.extend(overlay.custom);
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    if let Some(test) = self.test.as_mut() {
      test.visit_strings_mut(visit);
    }
    for field in [
      &mut self.interval,
      &mut self.timeout,
      &mut self.start_period,
    ] {
      if let Some(value) = field.as_mut() {
        visit(value);
      }
    }
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct UpdateConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parallelism: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delay: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure_action: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub monitor: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub order: Option<String>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

impl UpdateConfig {
  pub fn merge_from(&mut self, overlay: UpdateConfig) {
    if overlay.parallelism.is_some() {
      self.parallelism = overlay.parallelism;
    }
    if overlay.delay.is_some() {
      self.delay = overlay.delay;
    }
    if overlay.failure_action.is_some() {
      self.failure_action = overlay.failure_action;
    }
    if overlay.monitor.is_some() {
      self.monitor = overlay.monitor;
    }
    if overlay.order.is_some() {
      self.order = overlay.order;
    }
    self.custom.extend(overlay.custom);
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct RestartPolicy {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delay: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_attempts: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub window: Option<String>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

impl RestartPolicy {
  pub fn merge_from(&mut self, overlay: RestartPolicy) {
    if overlay.condition.is_some() {
      self.condition = overlay.condition;
    }
    if overlay.delay.is_some() {
      self.delay = overlay.delay;
    }
    if overlay.max_attempts.is_some() {
      self.max_attempts = overlay.max_attempts;
    }
    if overlay.window.is_some() {
      self.window = overlay.window;
    }
    self.custom.extend(overlay.custom);
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct Deploy {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub replicas: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub labels: Option<ListOrDict>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub update_config: Option<UpdateConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub restart_policy: Option<RestartPolicy>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

impl Deploy {
  pub fn merge_from(&mut self, overlay: Deploy) {
    if overlay.mode.is_some() {
      self.mode = overlay.mode;
    }
    if overlay.replicas.is_some() {
      self.replicas = overlay.replicas;
    }
    if let Some(labels) = overlay.labels {
      match self.labels.as_mut() {
        Some(current) => current.merge_from(labels),
        None => self.labels = Some(labels),
      }
    }
    if let Some(update_config) = overlay.update_config {
      match self.update_config.as_mut() {
        Some(current) => current.merge_from(update_config),
        None => self.update_config = Some(update_config),
      }
    }
    if let Some(restart_policy) = overlay.restart_policy {
      match self.restart_policy.as_mut() {
        Some(current) => current.merge_from(restart_policy),
        None => self.restart_policy = Some(restart_policy),
      }
    }
    self.custom.extend(overlay.custom);
  }
}

/// Long (object) form of a volume mount.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct VolumeLong {
  #[serde(
    rename = "type",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub read_only: Option<bool>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

/// A volume mount: short `source:target[:mode]` string or long
/// object form.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum VolumeMount {
  Short(String),
  Long(VolumeLong),
}

impl VolumeMount {
  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      VolumeMount::Short(s) => visit(s),
      VolumeMount::Long(long) => {
        if let Some(source) = long.source.as_mut() {
          visit(source);
        }
        if let Some(target) = long.target.as_mut() {
          visit(target);
        }
      }
    }
  }
}

impl<'de> Deserialize<'de> for VolumeMount {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    match value {
      serde_yaml_ng::Value::Mapping(_) => {
        serde_yaml_ng::from_value::<VolumeLong>(value)
          .map(VolumeMount::Long)
          .map_err(de::Error::custom)
      }
      scalar => Ok(VolumeMount::Short(scalar_string(scalar))),
    }
  }
}

/// Long form of a published port.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct PortLong {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub published: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protocol: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,
  #[serde(flatten)]
  pub custom: YamlMap,
}

/// A published port: short `HOST:CONTAINER` scalar or long form
/// with `protocol` / `mode`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortMapping {
  Short(String),
  Long(PortLong),
}

impl PortMapping {
  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      PortMapping::Short(s) => visit(s),
      PortMapping::Long(long) => {
        if let Some(protocol) = long.protocol.as_mut() {
          visit(protocol);
        }
        if let Some(mode) = long.mode.as_mut() {
          visit(mode);
        }
      }
    }
  }
}

impl<'de> Deserialize<'de> for PortMapping {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    match value {
      serde_yaml_ng::Value::Mapping(_) => {
        serde_yaml_ng::from_value::<PortLong>(value)
          .map(PortMapping::Long)
          .map_err(de::Error::custom)
      }
      scalar => Ok(PortMapping::Short(scalar_string(scalar))),
    }
  }
}

/// Long form of a secret / config reference.
#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
pub struct FileRefLong {
  pub source: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<u32>,
}

/// A secret or config reference on a service: bare source name or
/// long form with `target` / `mode`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileRef {
  Short(String),
  Long(FileRefLong),
}

impl FileRef {
  pub fn source(&self) -> &str {
    match self {
      FileRef::Short(source) => source,
      FileRef::Long(long) => &long.source,
    }
  }

  pub fn visit_strings_mut(
    &mut self,
    visit: &mut impl FnMut(&mut String),
  ) {
    match self {
      FileRef::Short(source) => visit(source),
      FileRef::Long(long) => {
        visit(&mut long.source);
        if let Some(target) = long.target.as_mut() {
          visit(target);
        }
      }
    }
  }
}

impl<'de> Deserialize<'de> for FileRef {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    match value {
      serde_yaml_ng::Value::Mapping(_) => {
        serde_yaml_ng::from_value::<FileRefLong>(value)
          .map(FileRef::Long)
          .map_err(de::Error::custom)
      }
      scalar => Ok(FileRef::Short(scalar_string(scalar))),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn port_short_form_accepts_numbers() {
    let port: PortMapping = serde_yaml_ng::from_str("8080").unwrap();
    assert_eq!(port, PortMapping::Short("8080".to_string()));
  }

  #[test]
  fn port_long_form_round_trips() {
    let port: PortMapping = serde_yaml_ng::from_str(
      "target: 80\npublished: 8080\nprotocol: tcp\nmode: ingress\n",
    )
    .unwrap();
    match &port {
      PortMapping::Long(long) => {
        assert_eq!(long.target, Some(80));
        assert_eq!(long.published, Some(8080));
        assert_eq!(long.protocol.as_deref(), Some("tcp"));
        assert_eq!(long.mode.as_deref(), Some("ingress"));
      }
      PortMapping::Short(_) => panic!("expected long form"),
    }
  }

  #[test]
  fn deploy_merge_is_field_and_key_wise() {
    let mut target: Deploy = serde_yaml_ng::from_str(
      "replicas: 1\nlabels:\n  a: '1'\n  b: '2'\n",
    )
    .unwrap();
    let overlay: Deploy = serde_yaml_ng::from_str(
      "replicas: 3\nlabels:\n  b: '9'\nrestart_policy:\n  condition: on-failure\n",
    )
    .unwrap();
    target.merge_from(overlay);
    assert_eq!(target.replicas, Some(3));
    let labels = target.labels.unwrap().to_map();
    assert_eq!(labels["a"], "1");
    assert_eq!(labels["b"], "9");
    assert_eq!(
      target.restart_policy.unwrap().condition.as_deref(),
      Some("on-failure")
    );
  }

  #[test]
  fn file_ref_parses_both_forms() {
    let short: FileRef =
      serde_yaml_ng::from_str("db_password").unwrap();
    assert_eq!(short.source(), "db_password");
    let long: FileRef = serde_yaml_ng::from_str(
      "source: db_password\ntarget: DB_PASSWORD\nmode: 292\n",
    )
    .unwrap();
    assert_eq!(long.source(), "db_password");
    match long {
      FileRef::Long(long) => {
        assert_eq!(long.mode, Some(0o444))
      }
      FileRef::Short(_) => panic!("expected long form"),
    }
  }
}
