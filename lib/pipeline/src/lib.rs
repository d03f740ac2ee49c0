//! # SwarmBender render pipeline
//!
//! An ordered sequence of stages mutating a shared
//! [`RenderContext`]. Each stage has a fixed integer order; a
//! [`PipelineMode`] selects which stages participate. Stages run
//! sequentially on one logical worker, so the context needs no
//! synchronization.

use std::path::PathBuf;

use compose::ComposeFile;
use config::{AppsettingsMode, SbConfig};
use environment::EnvBag;
use tracing::debug;

mod error;
pub mod stages;

pub use error::Error;

pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
  /// Produce the final Swarm-ready Compose YAML.
  StackRender,
  /// Produce the merged non-secret appsettings JSON.
  ConfigExport,
}

/// One render request, as resolved from CLI args and config.
#[derive(Debug, Clone)]
pub struct RenderRequest {
  pub root: PathBuf,
  pub stack_id: String,
  pub env: String,
  pub appsettings_mode: AppsettingsMode,
  pub out_dir: String,
  pub write_history: bool,
}

/// Shared state mutated by the stages.
#[derive(Debug)]
pub struct RenderContext {
  pub request: RenderRequest,
  pub config: SbConfig,
  pub mode: PipelineMode,
  /// The parsed template, untouched after load.
  pub template: ComposeFile,
  /// The document the stages mutate.
  pub working: ComposeFile,
  /// The aggregated environment bag, last-write-wins.
  pub env: EnvBag,
  pub template_path: PathBuf,
  pub out_file_path: Option<PathBuf>,
  pub history_file_path: Option<PathBuf>,
  pub warnings: Vec<String>,
}

impl RenderContext {
  pub fn new(
    request: RenderRequest,
    config: SbConfig,
    mode: PipelineMode,
  ) -> RenderContext {
    RenderContext {
      request,
      config,
      mode,
      template: ComposeFile::default(),
      working: ComposeFile::default(),
      env: EnvBag::new(),
      template_path: PathBuf::new(),
      out_file_path: None,
      history_file_path: None,
      warnings: Vec::new(),
    }
  }
}

/// Pipeline stages, discriminants are the fixed stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Stage {
  LoadTemplate = 10,
  ApplyOverlays = 20,
  CollectEnvJson = 30,
  AggregateProviders = 40,
  ApplyEnvironment = 50,
  ApplyGroups = 60,
  NormalizeLabels = 70,
  AttachSecrets = 80,
  ExpandTokens = 90,
  StringifyEnv = 100,
  StripCustom = 110,
  Emit = 120,
}

impl Stage {
  pub const ALL: [Stage; 12] = [
    Stage::LoadTemplate,
    Stage::ApplyOverlays,
    Stage::CollectEnvJson,
    Stage::AggregateProviders,
    Stage::ApplyEnvironment,
    Stage::ApplyGroups,
    Stage::NormalizeLabels,
    Stage::AttachSecrets,
    Stage::ExpandTokens,
    Stage::StringifyEnv,
    Stage::StripCustom,
    Stage::Emit,
  ];

  pub const fn order(self) -> u32 {
    self as u32
  }

  pub fn runs_in(self, mode: PipelineMode) -> bool {
    match mode {
      PipelineMode::StackRender => true,
      PipelineMode::ConfigExport => matches!(
        self,
        Stage::LoadTemplate
          | Stage::ApplyOverlays
          | Stage::CollectEnvJson
          | Stage::AggregateProviders
          | Stage::ApplyEnvironment
          | Stage::Emit
      ),
    }
  }

  async fn run(self, ctx: &mut RenderContext) -> Result<()> {
    match self {
      Stage::LoadTemplate => stages::template::load(ctx),
      Stage::ApplyOverlays => stages::overlay::apply(ctx),
      Stage::CollectEnvJson => stages::env_collect::run(ctx),
      Stage::AggregateProviders => {
        stages::providers::run(ctx).await;
        Ok(())
      }
      Stage::ApplyEnvironment => {
        stages::env_apply::run(ctx);
        Ok(())
      }
      Stage::ApplyGroups => stages::groups::apply(ctx),
      Stage::NormalizeLabels => {
        stages::labels::normalize(ctx);
        Ok(())
      }
      Stage::AttachSecrets => {
        stages::secrets_attach::run(ctx);
        Ok(())
      }
      Stage::ExpandTokens => {
        stages::tokens::expand(ctx);
        Ok(())
      }
      Stage::StringifyEnv => {
        stages::stringify::run(ctx);
        Ok(())
      }
      Stage::StripCustom => {
        ctx.working.strip_custom();
        Ok(())
      }
      Stage::Emit => stages::emit::run(ctx),
    }
  }
}

/// Stages participating in `mode`, in order.
pub fn stages_for(mode: PipelineMode) -> Vec<Stage> {
  let mut stages = Stage::ALL
    .into_iter()
    .filter(|stage| stage.runs_in(mode))
    .collect::<Vec<_>>();
  stages.sort_by_key(|stage| stage.order());
  stages
}

/// Run the selected stages to completion against a fresh
/// context; returns it for inspection and output paths.
pub async fn run(
  request: RenderRequest,
  config: SbConfig,
  mode: PipelineMode,
) -> Result<RenderContext> {
  let mut ctx = RenderContext::new(request, config, mode);
  for stage in stages_for(mode) {
    debug!(order = stage.order(), "stage {stage:?}");
    stage.run(&mut ctx).await?;
  }
  Ok(ctx)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stack_render_runs_every_stage_in_order() {
    let stages = stages_for(PipelineMode::StackRender);
    assert_eq!(stages.len(), Stage::ALL.len());
    let orders =
      stages.iter().map(|s| s.order()).collect::<Vec<_>>();
    let mut sorted = orders.clone();
    sorted.sort();
    assert_eq!(orders, sorted);
  }

  #[test]
  fn config_export_skips_stack_only_stages() {
    let stages = stages_for(PipelineMode::ConfigExport);
    assert!(!stages.contains(&Stage::AttachSecrets));
    assert!(!stages.contains(&Stage::StripCustom));
    assert!(stages.contains(&Stage::ApplyEnvironment));
    assert_eq!(*stages.last().unwrap(), Stage::Emit);
  }
}
