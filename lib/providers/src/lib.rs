//! # SwarmBender environment providers
//!
//! Pulls env values into the render's environment bag from the
//! process environment (allowlisted), Azure Key Vault and
//! Infisical, in the order configured under `providers.order`.
//! Provider failures never abort a render: each failing source is
//! skipped with a warning and the pipeline continues with the
//! partial bag.

use std::path::Path;

use config::{ProviderType, ProvidersConfig};
use environment::EnvBag;
use tracing::{debug, warn};

pub mod azure;
pub mod env;
pub mod file;
pub mod infisical;
pub mod keys;

/// Run the configured provider chain against `bag`. Returns the
/// warnings recorded for skipped sources.
pub async fn aggregate(
  config: &ProvidersConfig,
  root: &Path,
  stack_id: &str,
  env_name: &str,
  bag: &mut EnvBag,
) -> Vec<String> {
  let mut warnings = Vec::new();
  for provider in &config.order {
    match provider {
      // env JSON files are collected by the pipeline before the
      // provider chain runs
      ProviderType::File => {}
      ProviderType::Env => {
        env::collect(
          &config.env,
          root,
          stack_id,
          env_name,
          bag,
          &mut warnings,
        );
      }
      ProviderType::AzureKv => {
        if !config.azure_kv.enabled {
          continue;
        }
        match azure::collect(&config.azure_kv, stack_id, env_name)
          .await
        {
          Ok(values) => merge(bag, values),
          Err(e) => {
            warn!("azure-kv provider skipped | {e:#}");
            warnings
              .push(format!("azure-kv provider skipped: {e:#}"));
          }
        }
      }
      ProviderType::Infisical => {
        if !config.infisical.enabled {
          continue;
        }
        match infisical::collect(
          &config.infisical,
          stack_id,
          env_name,
        )
        .await
        {
          Ok(values) => merge(bag, values),
          Err(e) => {
            warn!("infisical provider skipped | {e:#}");
            warnings
              .push(format!("infisical provider skipped: {e:#}"));
          }
        }
      }
      ProviderType::Unknown => {
        debug!("unknown provider type in providers.order, ignored");
      }
    }
  }
  warnings
}

fn merge(bag: &mut EnvBag, values: Vec<(String, String)>) {
  for (key, value) in values {
    environment::insert_dual(bag, &key, &value);
  }
}
