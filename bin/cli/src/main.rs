#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use crate::config::{cli_args, load_sb_config, root_path};

mod args;
mod command;
mod config;

/// Exit codes: 0 success, 1 user error, 2 partial success with
/// warnings, 3 environment failure.
const EXIT_OK: u8 = 0;
const EXIT_USER: u8 = 1;
const EXIT_PARTIAL: u8 = 2;
const EXIT_FATAL: u8 = 3;

async fn app() -> u8 {
  dotenvy::dotenv().ok();
  let args = cli_args();
  let root = root_path();

  let sb_config = match load_sb_config(&root) {
    Ok(config) => config,
    Err(e) => {
      eprintln!("{e}");
      return EXIT_USER;
    }
  };
  if let Err(e) = logger::init(&sb_config.logging) {
    eprintln!("{e:#}");
    return EXIT_FATAL;
  }

  let result = match &args.command {
    args::Command::Config { unsanitized } => {
      command::print_config(&sb_config, *unsanitized)
    }
    args::Command::Render(render) => {
      command::render::handle(render, &root, &sb_config).await
    }
    args::Command::Secret { command } => {
      command::secret::handle(command, &root, &sb_config).await
    }
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      error!("{e:#}");
      EXIT_FATAL
    }
  }
}

#[tokio::main]
async fn main() -> ExitCode {
  let mut term_signal = match tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  ) {
    Ok(signal) => signal,
    Err(e) => {
      eprintln!("failed to install signal handler | {e}");
      return ExitCode::from(EXIT_FATAL);
    }
  };
  tokio::select! {
    code = app() => ExitCode::from(code),
    _ = term_signal.recv() => ExitCode::from(EXIT_FATAL),
  }
}
