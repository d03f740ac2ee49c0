//! The Swarm secret engine: list / create / remove external
//! secrets against a Docker endpoint.
//!
//! Two backends share the surface. The Engine API backend talks
//! to the daemon directly and is preferred; the CLI backend
//! shells out to `docker secret` for hosts where only the binary
//! is available.

use config::{EngineConfig, EngineType};
use indexmap::IndexMap;

mod api;
mod cli;

pub use api::ApiEngine;
pub use cli::CliEngine;

pub enum SecretEngine {
  Api(ApiEngine),
  Cli(CliEngine),
}

impl SecretEngine {
  pub fn connect(
    config: &EngineConfig,
  ) -> anyhow::Result<SecretEngine> {
    match config.kind {
      EngineType::DockerApi => {
        Ok(SecretEngine::Api(ApiEngine::connect(&config.args)?))
      }
      EngineType::DockerCli => {
        Ok(SecretEngine::Cli(CliEngine::new(&config.args)))
      }
    }
  }

  /// Existing secret names. Callers compare case-insensitively.
  pub async fn list(&self) -> anyhow::Result<Vec<String>> {
    match self {
      SecretEngine::Api(engine) => engine.list().await,
      SecretEngine::Cli(engine) => engine.list().await,
    }
  }

  /// Create a secret. An already-existing name is success.
  pub async fn create(
    &self,
    name: &str,
    value: &str,
    labels: &IndexMap<String, String>,
  ) -> anyhow::Result<()> {
    match self {
      SecretEngine::Api(engine) => {
        engine.create(name, value, labels).await
      }
      SecretEngine::Cli(engine) => {
        engine.create(name, value, labels).await
      }
    }
  }

  /// Remove a secret. A missing name is success.
  pub async fn remove(&self, name: &str) -> anyhow::Result<()> {
    match self {
      SecretEngine::Api(engine) => engine.remove(name).await,
      SecretEngine::Cli(engine) => engine.remove(name).await,
    }
  }
}
