use std::path::Path;

use colored::Colorize;
use config::SbConfig;
use secrets::{
  DesiredSecret, SecretEngine,
  sync::{self, UploadOutcome},
};

use crate::{
  EXIT_FATAL, EXIT_OK, EXIT_PARTIAL, EXIT_USER,
  args::{SecretArgs, SecretCommand},
};

fn masked(value: &str, show_values: bool) -> String {
  if show_values {
    value.to_string()
  } else {
    "********".to_string()
  }
}

fn print_desired(desired: &[DesiredSecret], show_values: bool) {
  for secret in desired {
    println!(
      "{}  {} {} {}",
      secret.external_name.bold(),
      secret.service_name.dimmed(),
      secret.key.dimmed(),
      masked(&secret.value, show_values),
    );
  }
}

async fn discover(
  args: &SecretArgs,
  root: &Path,
  config: &SbConfig,
) -> Result<(Vec<DesiredSecret>, Vec<String>), u8> {
  match secrets::discover(
    root,
    &args.stack_id,
    &args.env,
    config,
  )
  .await
  {
    Ok(result) => Ok(result),
    Err(e) => {
      eprintln!("{}: {e:#}", "ERROR".red());
      Err(EXIT_USER)
    }
  }
}

fn connect_engine(config: &SbConfig) -> Result<SecretEngine, u8> {
  match SecretEngine::connect(&config.secrets.engine) {
    Ok(engine) => Ok(engine),
    Err(e) => {
      eprintln!("{}: {e:#}", "ERROR".red());
      Err(EXIT_FATAL)
    }
  }
}

fn finish(warnings: Vec<String>) -> anyhow::Result<u8> {
  if warnings.is_empty() {
    Ok(EXIT_OK)
  } else {
    for warning in &warnings {
      eprintln!("{}: {warning}", "WARN".yellow());
    }
    Ok(EXIT_PARTIAL)
  }
}

pub async fn handle(
  command: &SecretCommand,
  root: &Path,
  config: &SbConfig,
) -> anyhow::Result<u8> {
  let args = command.args();
  let (desired, warnings) =
    match discover(args, root, config).await {
      Ok(result) => result,
      Err(code) => return Ok(code),
    };

  match command {
    SecretCommand::List(_) => {
      print_desired(&desired, args.show_values);
      finish(warnings)
    }
    SecretCommand::Diff(_) => {
      let engine = match connect_engine(config) {
        Ok(engine) => engine,
        Err(code) => return Ok(code),
      };
      match engine.list().await {
        Ok(existing) => {
          let report = sync::diff(
            &desired,
            &existing,
            &args.stack_id,
            &args.env,
          );
          for name in &report.create {
            println!("{} {name}", "create".green());
          }
          for name in &report.prune {
            println!("{} {name}", "prune".red());
          }
          for name in &report.matched {
            println!("{} {name}", "match".dimmed());
          }
          finish(warnings)
        }
        // diff degrades to a warning when the engine is away
        Err(e) => {
          eprintln!("{}: engine unavailable | {e:#}", "WARN".yellow());
          for name in sync::desired_names(&desired) {
            println!("{} {name}", "create".green());
          }
          Ok(EXIT_PARTIAL)
        }
      }
    }
    SecretCommand::Sync(_) => {
      let engine = match connect_engine(config) {
        Ok(engine) => engine,
        Err(code) => return Ok(code),
      };
      let report = sync::sync(
        &engine,
        config,
        &desired,
        &args.stack_id,
        &args.env,
        args.prune_old,
        args.dry_run,
      )
      .await?;
      println!(
        "created {}, pruned {}, unchanged {}",
        report.created.len(),
        report.pruned.len(),
        report.skipped.len(),
      );
      finish(warnings)
    }
    SecretCommand::Prune(_) => {
      let engine = match connect_engine(config) {
        Ok(engine) => engine,
        Err(code) => return Ok(code),
      };
      let pruned = sync::prune(
        &engine,
        &desired,
        &args.stack_id,
        &args.env,
        args.dry_run,
      )
      .await?;
      for name in &pruned {
        println!("{} {name}", "prune".red());
      }
      finish(warnings)
    }
    SecretCommand::Upload(_) => {
      if !config.providers.infisical.enabled {
        eprintln!(
          "{}: no remote store enabled under providers.infisical",
          "ERROR".red()
        );
        return Ok(EXIT_USER);
      }
      let outcomes = sync::upload(
        &config.providers.infisical,
        &desired,
        &args.stack_id,
        &args.env,
        args.dry_run,
      )
      .await?;
      for (key, outcome) in &outcomes {
        let tag = match outcome {
          UploadOutcome::Created => "create".green(),
          UploadOutcome::Updated => "update".yellow(),
          UploadOutcome::Unchanged => "match".dimmed(),
        };
        println!("{tag} {key}");
      }
      finish(warnings)
    }
  }
}
