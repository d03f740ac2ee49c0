//! Secret sync: diff the desired set against the Swarm engine,
//! create / prune, and upload values to the remote store.

use anyhow::Context;
use config::{InfisicalConfig, SbConfig};
use futures::{StreamExt, stream};
use indexmap::IndexMap;
use providers::infisical::InfisicalClient;
use tracing::{info, instrument, warn};

use crate::{DesiredSecret, SecretEngine};

/// Bound on concurrent remote-store upserts.
const UPLOAD_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
  pub create: Vec<String>,
  pub prune: Vec<String>,
  pub matched: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub created: Vec<String>,
  pub pruned: Vec<String>,
  pub skipped: Vec<String>,
}

/// Dedupe desired entries by external name, keeping the first.
pub fn desired_names(desired: &[DesiredSecret]) -> Vec<String> {
  let mut names = Vec::new();
  for secret in desired {
    if !names.contains(&secret.external_name) {
      names.push(secret.external_name.clone());
    }
  }
  names
}

/// Keep only engine entries owned by this stack and env:
/// `sb_<stackId>_` prefixed and carrying the `_<env>_` marker.
/// Comparison is case-insensitive.
pub fn scope_existing(
  existing: &[String],
  stack_id: &str,
  env_name: &str,
) -> Vec<String> {
  let prefix = format!("sb_{stack_id}_").to_lowercase();
  let marker = format!("_{env_name}_").to_lowercase();
  existing
    .iter()
    .filter(|name| {
      let lowered = name.to_lowercase();
      lowered.starts_with(&prefix) && lowered.contains(&marker)
    })
    .cloned()
    .collect()
}

/// Compute create / prune / match between the desired set and
/// the scoped engine listing. Output is ASCII-sorted.
pub fn diff(
  desired: &[DesiredSecret],
  existing: &[String],
  stack_id: &str,
  env_name: &str,
) -> DiffReport {
  let desired = desired_names(desired);
  let existing = scope_existing(existing, stack_id, env_name);
  let contains = |haystack: &[String], name: &str| {
    haystack.iter().any(|h| h.eq_ignore_ascii_case(name))
  };

  let mut report = DiffReport::default();
  for name in &desired {
    if contains(&existing, name) {
      report.matched.push(name.clone());
    } else {
      report.create.push(name.clone());
    }
  }
  for name in &existing {
    if !contains(&desired, name) {
      report.prune.push(name.clone());
    }
  }
  report.create.sort();
  report.prune.sort();
  report.matched.sort();
  report
}

fn create_labels(
  config: &SbConfig,
  stack_id: &str,
  env_name: &str,
) -> IndexMap<String, String> {
  let mut labels = config.secrets.labels.clone();
  labels.insert("sb.stack".to_string(), stack_id.to_string());
  labels.insert("sb.env".to_string(), env_name.to_string());
  labels
}

/// Create every missing desired secret; prune stack-scoped
/// leftovers when asked. `dry_run` suppresses all side effects.
#[instrument(skip(engine, config, desired))]
pub async fn sync(
  engine: &SecretEngine,
  config: &SbConfig,
  desired: &[DesiredSecret],
  stack_id: &str,
  env_name: &str,
  prune_old: bool,
  dry_run: bool,
) -> anyhow::Result<SyncReport> {
  let existing =
    engine.list().await.context("engine listing failed")?;
  let report = diff(desired, &existing, stack_id, env_name);
  let labels = create_labels(config, stack_id, env_name);

  let mut out = SyncReport {
    skipped: report.matched.clone(),
    ..Default::default()
  };
  for name in &report.create {
    let Some(secret) = desired
      .iter()
      .find(|secret| secret.external_name == *name)
    else {
      continue;
    };
    if dry_run {
      info!("dry-run: would create '{name}'");
    } else {
      engine.create(name, &secret.value, &labels).await?;
    }
    out.created.push(name.clone());
  }
  if prune_old {
    for name in &report.prune {
      if dry_run {
        info!("dry-run: would remove '{name}'");
      } else {
        engine.remove(name).await?;
      }
      out.pruned.push(name.clone());
    }
  }
  Ok(out)
}

/// Remove stack-scoped engine entries not in the desired set.
pub async fn prune(
  engine: &SecretEngine,
  desired: &[DesiredSecret],
  stack_id: &str,
  env_name: &str,
  dry_run: bool,
) -> anyhow::Result<Vec<String>> {
  let existing =
    engine.list().await.context("engine listing failed")?;
  let report = diff(desired, &existing, stack_id, env_name);
  let mut pruned = Vec::new();
  for name in &report.prune {
    if dry_run {
      info!("dry-run: would remove '{name}'");
    } else {
      engine.remove(name).await?;
    }
    pruned.push(name.clone());
  }
  Ok(pruned)
}

/// Resolve the remote route for a canonical key: first-hit over
/// the ordered rules, `pathTemplate` as fallback. Returns
/// `(read_paths, write_path)`.
pub fn route_for_key(
  config: &InfisicalConfig,
  key: &str,
  stack_id: &str,
  env_name: &str,
) -> (Vec<String>, String) {
  for route in &config.routes {
    let hit = route.patterns.iter().any(|pattern| {
      wildcard::Wildcard::new(pattern.as_bytes())
        .map(|wc| wc.is_match(key.as_bytes()))
        .unwrap_or(false)
    });
    if hit {
      let read_paths = route
        .read_paths
        .iter()
        .map(|path| {
          files::resolve_placeholders(path, stack_id, env_name)
        })
        .collect();
      let write_path = files::resolve_placeholders(
        &route.write_path,
        stack_id,
        env_name,
      );
      return (read_paths, write_path);
    }
  }
  let fallback = files::resolve_placeholders(
    &config.path_template,
    stack_id,
    env_name,
  );
  (vec![fallback.clone()], fallback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
  Created,
  Updated,
  Unchanged,
}

/// Upload discovered secrets to the remote store. Upserts run
/// with bounded concurrency; desired entries are deduped by key
/// first so each key has at most one in-flight operation.
#[instrument(skip(config, desired))]
pub async fn upload(
  config: &InfisicalConfig,
  desired: &[DesiredSecret],
  stack_id: &str,
  env_name: &str,
  dry_run: bool,
) -> anyhow::Result<Vec<(String, UploadOutcome)>> {
  let client = InfisicalClient::connect(config, env_name)
    .await
    .context("remote store unavailable")?;

  // last-wins per canonical key
  let mut by_key: IndexMap<String, &DesiredSecret> =
    IndexMap::new();
  for secret in desired {
    by_key.insert(secret.key.clone(), secret);
  }

  let results = stream::iter(by_key.into_iter())
    .map(|(key, secret)| {
      let client = &client;
      async move {
        let (read_paths, write_path) =
          route_for_key(config, &key, stack_id, env_name);
        let remote_key = files::resolve_placeholders(
          &config.key_template.replace("{key}", &key),
          stack_id,
          env_name,
        );
        let mut current = None;
        for path in &read_paths {
          match client.get_secret(path, &remote_key).await {
            Ok(Some(value)) => {
              current = Some(value);
              break;
            }
            Ok(None) => {}
            Err(e) => {
              warn!("remote read failed on '{path}' | {e:#}");
            }
          }
        }
        let outcome = match current {
          Some(value) if value == secret.value => {
            UploadOutcome::Unchanged
          }
          Some(_) => {
            if !dry_run {
              client
                .update_secret(
                  &write_path,
                  &remote_key,
                  &secret.value,
                )
                .await?;
            }
            UploadOutcome::Updated
          }
          None => {
            if !dry_run {
              client
                .create_secret(
                  &write_path,
                  &remote_key,
                  &secret.value,
                )
                .await?;
            }
            UploadOutcome::Created
          }
        };
        anyhow::Ok((key, outcome))
      }
    })
    .buffer_unordered(UPLOAD_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

  let mut out = Vec::new();
  for result in results {
    match result {
      Ok(entry) => out.push(entry),
      // one failed key does not abort the rest
      Err(e) => warn!("remote upsert failed | {e:#}"),
    }
  }
  out.sort_by(|(a, _), (b, _)| a.cmp(b));
  Ok(out)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn desired(names: &[&str]) -> Vec<DesiredSecret> {
    names
      .iter()
      .map(|name| DesiredSecret {
        service_name: "api".to_string(),
        key: "KEY".to_string(),
        value: "v".to_string(),
        version: "v1".to_string(),
        external_name: name.to_string(),
      })
      .collect()
  }

  #[test]
  fn diff_scopes_existing_by_prefix_and_env_marker() {
    let desired = desired(&["sb_app_api_dev_KEY_v1"]);
    let existing = vec![
      "sb_app_api_dev_KEY_v1".to_string(),
      "sb_app_api_prod_KEY_v1".to_string(),
      "unrelated".to_string(),
    ];
    let report = diff(&desired, &existing, "app", "dev");
    assert_eq!(
      report.matched,
      vec!["sb_app_api_dev_KEY_v1".to_string()]
    );
    assert!(report.prune.is_empty());
    assert!(report.create.is_empty());
  }

  #[test]
  fn diff_is_case_insensitive_on_names() {
    let desired = desired(&["sb_app_api_dev_KEY_v1"]);
    let existing = vec!["SB_APP_API_DEV_KEY_V1".to_string()];
    let report = diff(&desired, &existing, "app", "dev");
    assert!(report.create.is_empty());
    assert_eq!(report.matched.len(), 1);
  }

  #[test]
  fn diff_reports_create_and_prune() {
    let desired = desired(&["sb_app_api_dev_NEW_v1"]);
    let existing = vec!["sb_app_api_dev_OLD_v1".to_string()];
    let report = diff(&desired, &existing, "app", "dev");
    assert_eq!(
      report.create,
      vec!["sb_app_api_dev_NEW_v1".to_string()]
    );
    assert_eq!(
      report.prune,
      vec!["sb_app_api_dev_OLD_v1".to_string()]
    );
  }

  #[test]
  fn route_matching_is_first_hit() {
    let mut config = InfisicalConfig::default();
    config.routes = vec![
      config::RouteConfig {
        patterns: vec!["ConnectionStrings__*".to_string()],
        read_paths: vec!["/shared/conn".to_string()],
        write_path: "/shared/conn".to_string(),
      },
      config::RouteConfig {
        patterns: vec!["*".to_string()],
        read_paths: vec!["/{stackId}/{env}".to_string()],
        write_path: "/{stackId}/{env}".to_string(),
      },
    ];
    let (reads, write) = route_for_key(
      &config,
      "ConnectionStrings__Main",
      "app",
      "dev",
    );
    assert_eq!(reads, vec!["/shared/conn".to_string()]);
    assert_eq!(write, "/shared/conn");

    let (reads, write) =
      route_for_key(&config, "Other__Key", "app", "dev");
    assert_eq!(reads, vec!["/app/dev".to_string()]);
    assert_eq!(write, "/app/dev");
  }

  #[test]
  fn route_falls_back_to_path_template() {
    let config = InfisicalConfig::default();
    let (reads, write) =
      route_for_key(&config, "KEY", "app", "dev");
    assert_eq!(reads, vec!["/app".to_string()]);
    assert_eq!(write, "/app");
  }
}
