//! Docker Engine API backend, via bollard.

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bollard::{
  API_DEFAULT_VERSION, Docker,
  query_parameters::ListSecretsOptions, secret::SecretSpec,
};
use config::EngineArgs;
use indexmap::IndexMap;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct ApiEngine {
  docker: Docker,
}

impl ApiEngine {
  /// Connect to the endpoint from config, `DOCKER_HOST`, or the
  /// default local socket, in that order.
  pub fn connect(args: &EngineArgs) -> anyhow::Result<ApiEngine> {
    let host = args
      .host
      .clone()
      .or_else(|| std::env::var("DOCKER_HOST").ok());
    let docker = match host.as_deref() {
      None => Docker::connect_with_defaults(),
      Some(host) if host.starts_with("unix://") => {
        Docker::connect_with_unix(
          host,
          CONNECT_TIMEOUT_SECS,
          API_DEFAULT_VERSION,
        )
      }
      Some(host) => Docker::connect_with_http(
        host,
        CONNECT_TIMEOUT_SECS,
        API_DEFAULT_VERSION,
      ),
    }
    .context("failed to connect to docker daemon")?;
    Ok(ApiEngine { docker })
  }

  pub async fn list(&self) -> anyhow::Result<Vec<String>> {
    let secrets = self
      .docker
      .list_secrets(Option::<ListSecretsOptions>::None)
      .await
      .context("failed to list swarm secrets")?;
    Ok(
      secrets
        .into_iter()
        .filter_map(|secret| secret.spec.and_then(|spec| spec.name))
        .collect(),
    )
  }

  pub async fn create(
    &self,
    name: &str,
    value: &str,
    labels: &IndexMap<String, String>,
  ) -> anyhow::Result<()> {
    let spec = SecretSpec {
      name: Some(name.to_string()),
      data: Some(STANDARD.encode(value)),
      labels: Some(
        labels
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect(),
      ),
      ..Default::default()
    };
    match self.docker.create_secret(spec).await {
      Ok(_) => Ok(()),
      // conflict means the secret already exists
      Err(bollard::errors::Error::DockerResponseServerError {
        status_code: 409,
        ..
      }) => {
        debug!("secret '{name}' already exists");
        Ok(())
      }
      Err(e) => Err(e).with_context(|| {
        format!("failed to create swarm secret '{name}'")
      }),
    }
  }

  pub async fn remove(&self, name: &str) -> anyhow::Result<()> {
    match self.docker.delete_secret(name).await {
      Ok(()) => Ok(()),
      // already gone
      Err(bollard::errors::Error::DockerResponseServerError {
        status_code: 404,
        ..
      }) => Ok(()),
      Err(e) => Err(e).with_context(|| {
        format!("failed to remove swarm secret '{name}'")
      }),
    }
  }
}
