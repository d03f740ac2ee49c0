use std::path::Path;

use colored::Colorize;
use config::{AppsettingsMode, SbConfig};
use pipeline::{PipelineMode, RenderRequest};

use crate::{
  EXIT_FATAL, EXIT_OK, EXIT_PARTIAL, EXIT_USER, args::Render,
};

fn build_request(
  args: &Render,
  root: &Path,
  config: &SbConfig,
) -> RenderRequest {
  RenderRequest {
    root: root.to_path_buf(),
    stack_id: args.stack_id.clone(),
    env: args.env.clone(),
    appsettings_mode: args
      .appsettings_mode
      .map(Into::into)
      .unwrap_or(config.render.appsettings_mode),
    out_dir: args
      .out_dir
      .clone()
      .unwrap_or_else(|| config.render.out_dir.clone()),
    write_history: args
      .write_history
      .unwrap_or(config.render.write_history),
  }
}

async fn run_mode(
  request: RenderRequest,
  config: &SbConfig,
  mode: PipelineMode,
) -> Result<Vec<String>, u8> {
  match pipeline::run(request, config.clone(), mode).await {
    Ok(ctx) => Ok(ctx.warnings),
    Err(e) => {
      eprintln!("{}: {e}", "ERROR".red());
      Err(if e.is_user_error() {
        EXIT_USER
      } else {
        EXIT_FATAL
      })
    }
  }
}

pub async fn handle(
  args: &Render,
  root: &Path,
  config: &SbConfig,
) -> anyhow::Result<u8> {
  let request = build_request(args, root, config);
  let appsettings_mode = request.appsettings_mode;

  let mut warnings = match run_mode(
    request.clone(),
    config,
    PipelineMode::StackRender,
  )
  .await
  {
    Ok(warnings) => warnings,
    Err(code) => return Ok(code),
  };

  if appsettings_mode == AppsettingsMode::Config {
    match run_mode(request, config, PipelineMode::ConfigExport)
      .await
    {
      Ok(more) => warnings.extend(more),
      Err(code) => return Ok(code),
    }
  }

  if warnings.is_empty() {
    Ok(EXIT_OK)
  } else {
    for warning in &warnings {
      eprintln!("{}: {warning}", "WARN".yellow());
    }
    Ok(EXIT_PARTIAL)
  }
}
