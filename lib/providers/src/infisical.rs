//! Infisical adapter: machine-identity (universal auth) login,
//! secret listing for env aggregation, and the narrow read /
//! upsert surface the secret-sync upload uses.

use std::time::Duration;

use anyhow::{Context, anyhow};
use config::InfisicalConfig;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const CLIENT_ID_VAR: &str = "INFISICAL_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "INFISICAL_CLIENT_SECRET";

#[derive(Deserialize)]
struct LoginResponse {
  #[serde(rename = "accessToken")]
  access_token: String,
}

#[derive(Deserialize)]
struct RawSecret {
  #[serde(rename = "secretKey")]
  key: String,
  #[serde(rename = "secretValue")]
  value: String,
}

#[derive(Deserialize)]
struct ListResponse {
  secrets: Vec<RawSecret>,
}

#[derive(Deserialize)]
struct GetResponse {
  secret: RawSecret,
}

pub struct InfisicalClient {
  http: reqwest::Client,
  base_url: String,
  project_id: String,
  environment: String,
  token: String,
}

impl InfisicalClient {
  /// Authenticate with the client id / secret from the process
  /// environment.
  pub async fn connect(
    config: &InfisicalConfig,
    env_name: &str,
  ) -> anyhow::Result<InfisicalClient> {
    if config.project_id.is_empty() {
      return Err(anyhow!("infisical provider has no projectId"));
    }
    let client_id = std::env::var(CLIENT_ID_VAR)
      .with_context(|| format!("missing ${CLIENT_ID_VAR}"))?;
    let client_secret = std::env::var(CLIENT_SECRET_VAR)
      .with_context(|| format!("missing ${CLIENT_SECRET_VAR}"))?;
    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .context("Failed to build Infisical http client")?;
    let base_url =
      config.base_url.trim_end_matches('/').to_string();
    let login = http
      .post(format!(
        "{base_url}/api/v1/auth/universal-auth/login"
      ))
      .json(&json!({
        "clientId": client_id,
        "clientSecret": client_secret,
      }))
      .send()
      .await
      .context("Infisical login request failed")?
      .error_for_status()
      .context("Infisical login rejected")?
      .json::<LoginResponse>()
      .await
      .context("Failed to parse Infisical login response")?;
    Ok(InfisicalClient {
      http,
      base_url,
      project_id: config.project_id.clone(),
      environment: config
        .environment
        .clone()
        .unwrap_or_else(|| env_name.to_string()),
      token: login.access_token,
    })
  }

  /// List raw `(key, value)` pairs under one secret path.
  pub async fn list_secrets(
    &self,
    path: &str,
  ) -> anyhow::Result<Vec<(String, String)>> {
    let response = self
      .http
      .get(format!("{}/api/v3/secrets/raw", self.base_url))
      .bearer_auth(&self.token)
      .query(&[
        ("workspaceId", self.project_id.as_str()),
        ("environment", self.environment.as_str()),
        ("secretPath", path),
      ])
      .send()
      .await
      .with_context(|| {
        format!("Infisical list failed for path '{path}'")
      })?
      .error_for_status()
      .with_context(|| {
        format!("Infisical list rejected for path '{path}'")
      })?
      .json::<ListResponse>()
      .await
      .context("Failed to parse Infisical list response")?;
    Ok(
      response
        .secrets
        .into_iter()
        .map(|secret| (secret.key, secret.value))
        .collect(),
    )
  }

  /// Fetch one secret; `None` when the path does not hold it.
  pub async fn get_secret(
    &self,
    path: &str,
    key: &str,
  ) -> anyhow::Result<Option<String>> {
    let response = self
      .http
      .get(format!(
        "{}/api/v3/secrets/raw/{}",
        self.base_url,
        urlencoding::encode(key)
      ))
      .bearer_auth(&self.token)
      .query(&[
        ("workspaceId", self.project_id.as_str()),
        ("environment", self.environment.as_str()),
        ("secretPath", path),
      ])
      .send()
      .await
      .with_context(|| {
        format!("Infisical get failed for '{key}'")
      })?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let response = response.error_for_status().with_context(
      || format!("Infisical get rejected for '{key}'"),
    )?;
    let body = response
      .json::<GetResponse>()
      .await
      .context("Failed to parse Infisical get response")?;
    Ok(Some(body.secret.value))
  }

  async fn upsert(
    &self,
    method: reqwest::Method,
    path: &str,
    key: &str,
    value: &str,
  ) -> anyhow::Result<()> {
    self
      .http
      .request(
        method,
        format!(
          "{}/api/v3/secrets/raw/{}",
          self.base_url,
          urlencoding::encode(key)
        ),
      )
      .bearer_auth(&self.token)
      .json(&json!({
        "workspaceId": self.project_id,
        "environment": self.environment,
        "secretPath": path,
        "secretValue": value,
      }))
      .send()
      .await
      .with_context(|| {
        format!("Infisical upsert failed for '{key}'")
      })?
      .error_for_status()
      .with_context(|| {
        format!("Infisical upsert rejected for '{key}'")
      })?;
    Ok(())
  }

  pub async fn create_secret(
    &self,
    path: &str,
    key: &str,
    value: &str,
  ) -> anyhow::Result<()> {
    self.upsert(reqwest::Method::POST, path, key, value).await
  }

  pub async fn update_secret(
    &self,
    path: &str,
    key: &str,
    value: &str,
  ) -> anyhow::Result<()> {
    self.upsert(reqwest::Method::PATCH, path, key, value).await
  }
}

/// Read paths for aggregation: every route's `readPaths` in
/// declaration order, then the `pathTemplate` fallback.
fn read_paths(
  config: &InfisicalConfig,
  stack_id: &str,
  env_name: &str,
) -> Vec<String> {
  let mut paths = Vec::new();
  for route in &config.routes {
    for path in &route.read_paths {
      let resolved =
        files::resolve_placeholders(path, stack_id, env_name);
      if !paths.contains(&resolved) {
        paths.push(resolved);
      }
    }
  }
  if paths.is_empty() {
    paths.push(files::resolve_placeholders(
      &config.path_template,
      stack_id,
      env_name,
    ));
  }
  paths
}

/// Collect secrets for `(stackId, env)` across the configured
/// read paths, canonical keys out. Failing paths are skipped.
#[instrument(skip(config))]
pub async fn collect(
  config: &InfisicalConfig,
  stack_id: &str,
  env_name: &str,
) -> anyhow::Result<Vec<(String, String)>> {
  let client = InfisicalClient::connect(config, env_name).await?;
  let mut out = Vec::new();
  for path in read_paths(config, stack_id, env_name) {
    match client.list_secrets(&path).await {
      Ok(secrets) => {
        for (raw, value) in secrets {
          if let Some(key) = crate::keys::shape(
            &raw,
            &config.replace,
            &config.include,
          ) {
            out.push((key, value));
          }
        }
      }
      // single-path failure leaves other paths alive
      Err(e) => warn!("Infisical path '{path}' skipped | {e:#}"),
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn read_paths_honor_routes_then_fallback() {
    let mut config = InfisicalConfig::default();
    config.routes = vec![config::RouteConfig {
      patterns: vec!["ConnectionStrings__*".to_string()],
      read_paths: vec![
        "/shared".to_string(),
        "/{stackId}/{env}".to_string(),
      ],
      write_path: "/{stackId}/{env}".to_string(),
    }];
    assert_eq!(
      read_paths(&config, "app", "dev"),
      vec!["/shared".to_string(), "/app/dev".to_string()]
    );

    config.routes.clear();
    assert_eq!(
      read_paths(&config, "app", "dev"),
      vec!["/app".to_string()]
    );
  }
}
