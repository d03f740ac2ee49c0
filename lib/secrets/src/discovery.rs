//! Secret discovery: re-run env aggregation and secretize
//! matching to enumerate the external secrets a stack wants,
//! without touching any remote state.

use std::path::Path;

use config::SbConfig;
use environment::EnvBag;
use tracing::instrument;

use crate::{
  matcher::SecretizeMatcher,
  naming::{NameParts, external_name, version_token},
};

/// One secret the stack wants to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSecret {
  pub service_name: String,
  /// Canonical env key.
  pub key: String,
  pub value: String,
  pub version: String,
  pub external_name: String,
}

/// Service names the discovery scopes secrets to: the template's
/// services, or the synthetic `all` when no template parses.
fn target_services(root: &Path, stack_id: &str) -> Vec<String> {
  for file_name in
    ["docker-stack.template.yml", "docker-stack.template.yaml"]
  {
    let path =
      root.join("stacks").join(stack_id).join(file_name);
    if !path.is_file() {
      continue;
    }
    if let Ok(template) =
      files::read_yaml::<compose::ComposeFile>(&path)
    {
      let names =
        template.services.keys().cloned().collect::<Vec<_>>();
      if !names.is_empty() {
        return names;
      }
    }
  }
  vec!["all".to_string()]
}

/// Run env collection and provider aggregation, then compute the
/// desired secret tuple per target service and matching key.
/// Returns the desired set plus provider warnings.
#[instrument(skip(config))]
pub async fn discover(
  root: &Path,
  stack_id: &str,
  env_name: &str,
  config: &SbConfig,
) -> anyhow::Result<(Vec<DesiredSecret>, Vec<String>)> {
  let mut bag = EnvBag::new();
  providers::file::collect(
    &config.providers.file,
    root,
    stack_id,
    env_name,
    &mut bag,
  )?;
  let warnings = providers::aggregate(
    &config.providers,
    root,
    stack_id,
    env_name,
    &mut bag,
  )
  .await;

  let matcher = SecretizeMatcher::new(&config.secretize.paths);
  let mut desired = Vec::new();
  if !config.secretize.enabled || matcher.is_empty() {
    return Ok((desired, warnings));
  }

  let bag = environment::collapse_dual(&bag);
  for service_name in target_services(root, stack_id) {
    for (key, value) in &bag {
      if !matcher.is_match(key) {
        continue;
      }
      let version = version_token(
        config.secrets.version_mode,
        &config.secrets.static_version,
        value,
      );
      let name = external_name(
        &config.secrets.name_template,
        &NameParts {
          stack_id,
          service_name: &service_name,
          env: env_name,
          key,
        },
        &version,
      );
      desired.push(DesiredSecret {
        service_name: service_name.clone(),
        key: key.clone(),
        value: value.clone(),
        version,
        external_name: name,
      });
    }
  }
  Ok((desired, warnings))
}

#[cfg(test)]
mod tests {
  use std::fs;

  use config::VersionMode;
  use pretty_assertions::assert_eq;

  use super::*;

  fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
  }

  #[tokio::test]
  async fn discovers_per_template_service() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
      root,
      "stacks/app/docker-stack.template.yml",
      "services:\n  api:\n    image: a\n  worker:\n    image: b\n",
    );
    write(
      root,
      "stacks/app/dev/env/conn.json",
      r#"{"ConnectionStrings":{"Main":"Server=db;"}}"#,
    );
    let mut config = SbConfig::default();
    config.secretize.enabled = true;
    config.secretize.paths =
      vec!["ConnectionStrings__*".to_string()];
    config.secrets.version_mode = VersionMode::Static;

    let (desired, warnings) =
      discover(root, "app", "dev", &config).await.unwrap();
    // default provider order includes env, whose default
    // allowlist search misses in this fixture
    assert!(!warnings.is_empty());
    let names = desired
      .iter()
      .map(|secret| secret.external_name.clone())
      .collect::<Vec<_>>();
    assert_eq!(
      names,
      vec![
        "sb_app_api_dev_ConnectionStrings__Main_v1".to_string(),
        "sb_app_worker_dev_ConnectionStrings__Main_v1"
          .to_string(),
      ]
    );
    assert_eq!(desired[0].value, "Server=db;");
  }

  #[tokio::test]
  async fn missing_template_scopes_to_all() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "stacks/app/dev/env/s.json", r#"{"X":{"S":"v"}}"#);
    let mut config = SbConfig::default();
    config.secretize.enabled = true;
    config.secretize.paths = vec!["X__*".to_string()];
    config.secrets.version_mode = VersionMode::Static;

    let (desired, _) =
      discover(root, "app", "dev", &config).await.unwrap();
    assert_eq!(desired.len(), 1);
    assert_eq!(desired[0].service_name, "all");
    assert_eq!(
      desired[0].external_name,
      "sb_app_all_dev_X__S_v1"
    );
  }

  #[tokio::test]
  async fn disabled_secretize_discovers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "stacks/app/dev/env/s.json", r#"{"X":"v"}"#);
    let config = SbConfig::default();
    let (desired, _) =
      discover(root, "app", "dev", &config).await.unwrap();
    assert!(desired.is_empty());
  }
}
