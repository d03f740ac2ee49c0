//! Terminal stage: serialize the working model (StackRender) or
//! export the merged appsettings JSON (ConfigExport). All
//! filesystem effects of a render happen here.

use std::path::PathBuf;

use secrets::SecretizeMatcher;
use tracing::info;

use crate::{Error, PipelineMode, RenderContext, Result};

fn out_dir(ctx: &RenderContext) -> PathBuf {
  let out = PathBuf::from(&ctx.request.out_dir);
  if out.is_absolute() {
    out
  } else {
    ctx.request.root.join(out)
  }
}

fn write_stack(ctx: &mut RenderContext) -> Result<()> {
  let yaml = serde_yaml_ng::to_string(&ctx.working)
    .map_err(|e| Error::Serialize { e })?;
  let file_name = format!(
    "{}-{}.stack.yml",
    ctx.request.stack_id, ctx.request.env
  );
  let out_path = out_dir(ctx).join(&file_name);
  files::write_atomic(&out_path, &yaml)?;
  info!(
    "rendered {} services, {} external secrets -> {}",
    ctx.working.services.len(),
    ctx.working.secrets.len(),
    out_path.display()
  );

  if ctx.request.write_history {
    let stamp =
      chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let history_path = ctx
      .request
      .root
      .join("ops/state/history")
      .join(stamp)
      .join(&file_name);
    files::write_atomic(&history_path, &yaml)?;
    ctx.history_file_path = Some(history_path);
  }
  ctx.out_file_path = Some(out_path);
  Ok(())
}

fn export_appsettings(ctx: &mut RenderContext) -> Result<()> {
  let matcher =
    SecretizeMatcher::new(&ctx.config.secretize.paths);
  let drop_secrets =
    ctx.config.secretize.enabled && !matcher.is_empty();

  // one bag across services, last service wins per key
  let mut merged = environment::EnvBag::new();
  for service in ctx.working.services.values() {
    for (key, value) in service.environment_map() {
      merged.insert(key, value);
    }
  }
  let merged = environment::collapse_dual(&merged);
  let mut kept = environment::EnvBag::new();
  for (key, value) in merged {
    if drop_secrets && matcher.is_match(&key) {
      continue;
    }
    kept.insert(key, value);
  }

  let json = environment::unflatten(&kept);
  let pretty = serde_json::to_string_pretty(&json)
    .map_err(|e| Error::SerializeJson { e })?;
  let out_path = out_dir(ctx).join(format!(
    "{}-{}.appsettings.json",
    ctx.request.stack_id, ctx.request.env
  ));
  files::write_atomic(&out_path, &pretty)?;
  info!(
    "exported {} settings -> {}",
    kept.len(),
    out_path.display()
  );
  ctx.out_file_path = Some(out_path);
  Ok(())
}

pub fn run(ctx: &mut RenderContext) -> Result<()> {
  match ctx.mode {
    PipelineMode::StackRender => write_stack(ctx),
    PipelineMode::ConfigExport => export_appsettings(ctx),
  }
}
