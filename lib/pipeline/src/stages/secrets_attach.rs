//! Secrets attach: strip secretizable env keys, mint external
//! secret names, attach references.
//!
//! This stage also enforces the canonical-key discipline: after
//! it runs, service environments hold only `__`-form keys.

use compose::{FileRef, FileRefLong, SecretDef};
use secrets::{NameParts, SecretizeMatcher};
use tracing::debug;

use crate::RenderContext;

/// File mode for attached secret references.
const SECRET_MODE: u32 = 0o444;

pub fn run(ctx: &mut RenderContext) {
  let matcher =
    SecretizeMatcher::new(&ctx.config.secretize.paths);
  let secretize =
    ctx.config.secretize.enabled && !matcher.is_empty();

  let service_names =
    ctx.working.services.keys().cloned().collect::<Vec<_>>();
  for service_name in service_names {
    let Some(service) =
      ctx.working.services.get_mut(&service_name)
    else {
      continue;
    };
    // dotted / canonical twins collapse here, __ form wins
    let env_map =
      environment::collapse_dual(&service.environment_map());
    if !secretize {
      if env_map.is_empty() {
        service.environment = None;
      } else {
        service.set_environment_map(env_map);
      }
      continue;
    }

    let mut kept = environment::EnvBag::new();
    let mut refs = Vec::new();
    for (key, value) in env_map {
      if !matcher.is_match(&key) {
        kept.insert(key, value);
        continue;
      }
      let version = secrets::version_token(
        ctx.config.secrets.version_mode,
        &ctx.config.secrets.static_version,
        &value,
      );
      let external_name = secrets::external_name(
        &ctx.config.secrets.name_template,
        &NameParts {
          stack_id: &ctx.request.stack_id,
          service_name: &service_name,
          env: &ctx.request.env,
          key: &key,
        },
        &version,
      );
      debug!(
        "secretize {key} on '{service_name}' -> {external_name}"
      );
      refs.push((external_name, key));
    }
    if kept.is_empty() {
      service.environment = None;
    } else {
      service.set_environment_map(kept);
    }
    for (external_name, target) in &refs {
      let exists = service
        .secrets
        .iter()
        .any(|secret| secret.source() == external_name.as_str());
      if !exists {
        service.secrets.push(FileRef::Long(FileRefLong {
          source: external_name.clone(),
          target: Some(target.clone()),
          uid: None,
          gid: None,
          mode: Some(SECRET_MODE),
        }));
      }
    }
    service.dedupe_secret_refs();

    for (external_name, _) in refs {
      if !ctx.working.secrets.contains_key(&external_name) {
        ctx.working.secrets.insert(
          external_name.clone(),
          SecretDef::external(external_name),
        );
      }
    }
  }
}
