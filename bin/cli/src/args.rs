//! CLI argument parsing.

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(name = "sb", version, about = "SwarmBender: compose a Swarm stack from templates, overlays and secret providers", author)]
pub struct CliArgs {
  #[command(subcommand)]
  pub command: Command,

  /// Repository root. Defaults to the current directory.
  #[arg(long, global = true)]
  pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
  /// Render the final Swarm-ready Compose file. (alias: `r`)
  #[clap(alias = "r")]
  Render(Render),

  /// Inspect and synchronize external Swarm secrets. (alias: `s`)
  #[clap(alias = "s")]
  Secret {
    #[command(subcommand)]
    command: SecretCommand,
  },

  /// Print the effective tool config. (aliases: `cfg`, `cf`)
  #[clap(alias = "cfg", alias = "cf")]
  Config {
    /// Print remote-store identifiers unmasked.
    #[arg(long, action)]
    unsanitized: bool,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AppsettingsModeArg {
  Env,
  Config,
}

impl From<AppsettingsModeArg> for config::AppsettingsMode {
  fn from(mode: AppsettingsModeArg) -> config::AppsettingsMode {
    match mode {
      AppsettingsModeArg::Env => config::AppsettingsMode::Env,
      AppsettingsModeArg::Config => {
        config::AppsettingsMode::Config
      }
    }
  }
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Render {
  /// The stack to render.
  pub stack_id: String,

  /// Target environment, eg. `dev` / `prod`.
  #[arg(long, short = 'e')]
  pub env: String,

  /// Output directory, overriding `render.outDir`.
  #[arg(long, short = 'o')]
  pub out_dir: Option<String>,

  /// Snapshot the artifact under `ops/state/history`.
  #[arg(long)]
  pub write_history: Option<bool>,

  /// Where aggregated settings land: service env vars, or an
  /// exported appsettings JSON alongside the stack file.
  #[arg(long, value_enum)]
  pub appsettings_mode: Option<AppsettingsModeArg>,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum SecretCommand {
  /// Print the desired external secret set. (alias: `ls`)
  #[clap(alias = "ls")]
  List(SecretArgs),

  /// Compare desired secrets against the Swarm engine.
  Diff(SecretArgs),

  /// Create missing secrets in the Swarm engine.
  Sync(SecretArgs),

  /// Remove stack-scoped engine secrets no longer desired.
  Prune(SecretArgs),

  /// Upsert discovered secret values into the remote store.
  #[clap(alias = "up")]
  Upload(SecretArgs),
}

impl SecretCommand {
  pub fn args(&self) -> &SecretArgs {
    match self {
      SecretCommand::List(args)
      | SecretCommand::Diff(args)
      | SecretCommand::Sync(args)
      | SecretCommand::Prune(args)
      | SecretCommand::Upload(args) => args,
    }
  }
}

#[derive(Debug, Clone, clap::Parser)]
pub struct SecretArgs {
  /// The stack whose secrets to work on.
  pub stack_id: String,

  /// Target environment, eg. `dev` / `prod`.
  #[arg(long, short = 'e')]
  pub env: String,

  /// Report what would change without touching anything.
  #[arg(long, action)]
  pub dry_run: bool,

  /// With `sync`: also remove stack-scoped leftovers.
  #[arg(long, action)]
  pub prune_old: bool,

  /// Print secret values instead of masking them.
  #[arg(long, action)]
  pub show_values: bool,
}
