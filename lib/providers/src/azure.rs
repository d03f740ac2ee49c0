//! Azure Key Vault adapter.
//!
//! Narrow surface: authenticate with client credentials, list
//! secret names under the `<stackId><sep><env><sep>` prefix,
//! fetch the matching values. Individual secret fetch failures
//! are logged and skipped.

use std::time::Duration;

use anyhow::{Context, anyhow};
use config::AzureKvConfig;
use serde::Deserialize;
use tracing::{instrument, warn};

const API_VERSION: &str = "7.4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
}

#[derive(Deserialize)]
struct SecretItem {
  id: String,
}

#[derive(Deserialize)]
struct SecretListPage {
  #[serde(default)]
  value: Vec<SecretItem>,
  #[serde(rename = "nextLink")]
  next_link: Option<String>,
}

#[derive(Deserialize)]
struct SecretBundle {
  value: String,
}

async fn access_token(
  http: &reqwest::Client,
  config: &AzureKvConfig,
) -> anyhow::Result<String> {
  let client_secret = std::env::var(&config.client_secret_env)
    .with_context(|| {
      format!(
        "missing Azure client secret in ${}",
        config.client_secret_env
      )
    })?;
  let url = format!(
    "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
    config.tenant_id
  );
  let response = http
    .post(&url)
    .form(&[
      ("grant_type", "client_credentials"),
      ("client_id", config.client_id.as_str()),
      ("client_secret", client_secret.as_str()),
      ("scope", "https://vault.azure.net/.default"),
    ])
    .send()
    .await
    .context("Azure token request failed")?
    .error_for_status()
    .context("Azure token request rejected")?;
  let token = response
    .json::<TokenResponse>()
    .await
    .context("Failed to parse Azure token response")?;
  Ok(token.access_token)
}

/// List every secret name in the vault, following paging links.
async fn list_names(
  http: &reqwest::Client,
  config: &AzureKvConfig,
  token: &str,
) -> anyhow::Result<Vec<String>> {
  let mut names = Vec::new();
  let mut url = format!(
    "{}/secrets?api-version={API_VERSION}",
    config.vault_url.trim_end_matches('/')
  );
  loop {
    let page = http
      .get(&url)
      .bearer_auth(token)
      .send()
      .await
      .context("Key Vault list request failed")?
      .error_for_status()
      .context("Key Vault list request rejected")?
      .json::<SecretListPage>()
      .await
      .context("Failed to parse Key Vault list response")?;
    for item in page.value {
      if let Some(name) = item.id.rsplit('/').next() {
        names.push(name.to_string());
      }
    }
    match page.next_link {
      Some(next) => url = next,
      None => break,
    }
  }
  Ok(names)
}

/// Collect secrets scoped to `<stackId>/<env>` as canonical
/// key/value pairs.
#[instrument(skip(config))]
pub async fn collect(
  config: &AzureKvConfig,
  stack_id: &str,
  env_name: &str,
) -> anyhow::Result<Vec<(String, String)>> {
  if config.vault_url.is_empty() {
    return Err(anyhow!("azure-kv provider has no vaultUrl"));
  }
  let http = reqwest::Client::builder()
    .timeout(REQUEST_TIMEOUT)
    .build()
    .context("Failed to build Azure http client")?;
  let token = access_token(&http, config).await?;
  let names = list_names(&http, config, &token).await?;

  let prefix =
    format!("{stack_id}{0}{env_name}{0}", config.separator);
  let vault = config.vault_url.trim_end_matches('/');
  let mut out = Vec::new();
  for name in names {
    let Some(remainder) = name.strip_prefix(&prefix) else {
      continue;
    };
    let raw = remainder.replace(&config.separator, "__");
    let Some(key) =
      crate::keys::shape(&raw, &config.replace, &config.include)
    else {
      continue;
    };
    let url =
      format!("{vault}/secrets/{name}?api-version={API_VERSION}");
    let fetched = async {
      http
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?
        .json::<SecretBundle>()
        .await
    }
    .await;
    match fetched {
      Ok(bundle) => out.push((key, bundle.value)),
      // per-path fail soft, the rest of the vault still lands
      Err(e) => warn!("Key Vault secret '{name}' skipped | {e}"),
    }
  }
  Ok(out)
}
