use std::{
  path::{Path, PathBuf},
  sync::OnceLock,
};

use clap::Parser;
use colored::Colorize;
use serde::Deserialize;

use crate::args::CliArgs;

pub fn cli_args() -> &'static CliArgs {
  static CLI_ARGS: OnceLock<CliArgs> = OnceLock::new();
  CLI_ARGS.get_or_init(CliArgs::parse)
}

/// Process environment overrides.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Env {
  /// Repository root fallback when `--root` is not given.
  pub sb_root: Option<PathBuf>,
}

pub fn cli_env() -> &'static Env {
  static CLI_ENV: OnceLock<Env> = OnceLock::new();
  CLI_ENV.get_or_init(|| {
    match envy::from_env::<Env>() {
      Ok(env) => env,
      Err(e) => {
        eprintln!(
          "{}: Failed to parse SwarmBender environment | {e}",
          "ERROR".red()
        );
        Env::default()
      }
    }
  })
}

pub fn root_path() -> PathBuf {
  cli_args()
    .root
    .clone()
    .or_else(|| cli_env().sb_root.clone())
    .unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_sb_config(
  root: &Path,
) -> ::config::Result<::config::SbConfig> {
  ::config::SbConfig::load(root)
}
