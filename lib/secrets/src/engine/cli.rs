//! Docker CLI backend. Commands run through `sh -c`; secret
//! values are streamed to `docker secret create` over stdin,
//! never passed as an argument.

use std::time::Duration;

use anyhow::{Context, anyhow};
use config::EngineArgs;
use indexmap::IndexMap;
use run_command::{CommandOutput, async_run_command};
use shell_escape::escape;

/// Wall-clock limit on a single docker CLI call.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CliEngine {
  docker_path: String,
}

fn quoted(value: &str) -> String {
  escape(value.into()).into_owned()
}

async fn run(command: &str) -> anyhow::Result<CommandOutput> {
  tokio::time::timeout(COMMAND_TIMEOUT, async_run_command(command))
    .await
    .context("docker command timed out")
}

impl CliEngine {
  pub fn new(args: &EngineArgs) -> CliEngine {
    CliEngine {
      docker_path: args
        .docker_path
        .clone()
        .unwrap_or_else(|| "docker".to_string()),
    }
  }

  fn command_error(
    action: &str,
    stdout: &str,
    stderr: &str,
  ) -> anyhow::Error {
    let mut e = anyhow!("End of trace");
    for line in
      stderr.split('\n').filter(|line| !line.is_empty()).rev()
    {
      e = e.context(line.to_string());
    }
    for line in
      stdout.split('\n').filter(|line| !line.is_empty()).rev()
    {
      e = e.context(line.to_string());
    }
    e.context(format!("docker secret {action} failed"))
  }

  pub async fn list(&self) -> anyhow::Result<Vec<String>> {
    let command = format!(
      "{} secret ls --format '{{{{.Name}}}}'",
      self.docker_path
    );
    let output = run(&command).await?;
    if !output.success() {
      return Err(Self::command_error(
        "ls",
        &output.stdout,
        &output.stderr,
      ));
    }
    Ok(
      output
        .stdout
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .collect(),
    )
  }

  pub async fn create(
    &self,
    name: &str,
    value: &str,
    labels: &IndexMap<String, String>,
  ) -> anyhow::Result<()> {
    let labels = labels
      .iter()
      .map(|(k, v)| format!(" -l {}", quoted(&format!("{k}={v}"))))
      .collect::<Vec<_>>()
      .join("");
    let command = format!(
      "printf '%s' {} | {} secret create{labels} {} -",
      quoted(value),
      self.docker_path,
      quoted(name),
    );
    let output = run(&command).await?;
    if output.success() {
      return Ok(());
    }
    // conflict means the secret already exists
    if output.stderr.contains("already exists") {
      return Ok(());
    }
    Err(Self::command_error(
      "create",
      &output.stdout,
      &output.stderr,
    ))
  }

  pub async fn remove(&self, name: &str) -> anyhow::Result<()> {
    let command = format!(
      "{} secret rm {}",
      self.docker_path,
      quoted(name)
    );
    let output = run(&command).await?;
    if output.success() {
      return Ok(());
    }
    // already gone
    if output.stderr.contains("not found") {
      return Ok(());
    }
    Err(Self::command_error(
      "rm",
      &output.stdout,
      &output.stderr,
    ))
  }
}
