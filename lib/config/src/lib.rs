//! # SwarmBender Config
//!
//! Parses the tool's own configuration from `ops/sb.yml`.
//! Every section has complete defaults so a repository without an
//! `sb.yml` still renders.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod logging;

pub use logging::{LogConfig, LogLevel, StdioLogMode};

pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Read(#[from] files::Error),
}

/// Relative location of the tool config inside a repository.
pub const SB_CONFIG_PATH: &str = "ops/sb.yml";

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct SbConfig {
  pub render: RenderConfig,
  pub tokens: TokensConfig,
  pub secretize: SecretizeConfig,
  pub secrets: SecretsConfig,
  pub providers: ProvidersConfig,
  pub logging: LogConfig,
}

impl SbConfig {
  /// Load `ops/sb.yml` under the given repository root, falling
  /// back to defaults when the file does not exist.
  pub fn load(root: &Path) -> Result<SbConfig> {
    let path = root.join(SB_CONFIG_PATH);
    if !path.is_file() {
      debug!(
        "no config at {}, using defaults",
        path.display()
      );
      return Ok(SbConfig::default());
    }
    Ok(files::read_yaml(&path)?)
  }

  /// Copy with remote-store identifiers masked, for printing.
  pub fn sanitized(&self) -> SbConfig {
    let mut config = self.clone();
    if !config.providers.azure_kv.tenant_id.is_empty() {
      config.providers.azure_kv.tenant_id = "*****".to_string();
    }
    if !config.providers.azure_kv.client_id.is_empty() {
      config.providers.azure_kv.client_id = "*****".to_string();
    }
    if !config.providers.infisical.project_id.is_empty() {
      config.providers.infisical.project_id = "*****".to_string();
    }
    config
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum AppsettingsMode {
  /// Merge the env bag into each service's `environment`.
  #[default]
  Env,
  /// Keep service environments lean and export a merged
  /// appsettings JSON next to the stack file.
  Config,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
  pub appsettings_mode: AppsettingsMode,
  pub out_dir: String,
  pub write_history: bool,
  /// Glob patterns applied in order; `{stackId}` / `{env}`
  /// placeholders are resolved per render.
  pub overlay_order: Vec<String>,
  /// Abort when two overlays in the same pattern disagree on a
  /// scalar. Off by default: later files win with a warning.
  pub strict_overlays: bool,
}

pub fn default_overlay_order() -> Vec<String> {
  vec![
    "stacks/all/{env}/stack/*.y?(a)ml".to_string(),
    "stacks/{stackId}/{env}/stack/*.y?(a)ml".to_string(),
  ]
}

impl Default for RenderConfig {
  fn default() -> RenderConfig {
    RenderConfig {
      appsettings_mode: AppsettingsMode::default(),
      out_dir: "out".to_string(),
      write_history: false,
      overlay_order: default_overlay_order(),
      strict_overlays: false,
    }
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct TokensConfig {
  /// User tokens, merged over the implicit `SB_STACK_ID`,
  /// `SB_ENV` and `SB_SERVICE_NAME`.
  pub user: IndexMap<String, String>,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretizeConfig {
  pub enabled: bool,
  /// Wildcard patterns matched case-insensitively against env
  /// keys, in both raw and canonical form.
  pub paths: Vec<String>,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq,
)]
#[serde(rename_all = "kebab-case")]
pub enum EngineType {
  #[default]
  DockerApi,
  DockerCli,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineArgs {
  /// Docker endpoint for the API backend. Falls back to
  /// `DOCKER_HOST`, then the local unix socket.
  pub host: Option<String>,
  /// Binary to shell out to for the CLI backend.
  pub docker_path: Option<String>,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  #[serde(rename = "type")]
  pub kind: EngineType,
  pub args: EngineArgs,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq,
)]
#[serde(rename_all = "kebab-case")]
pub enum VersionMode {
  /// Short lowercase hex prefix of `SHA-256(value)`.
  #[default]
  ContentSha,
  /// A fixed literal (`staticVersion`).
  Static,
  /// Compact UTC `yyyyMMddHHmmss`.
  Timestamp,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsConfig {
  pub engine: EngineConfig,
  pub name_template: String,
  pub version_mode: VersionMode,
  pub static_version: String,
  /// Extra labels attached to every created Swarm secret.
  pub labels: IndexMap<String, String>,
}

pub const DEFAULT_NAME_TEMPLATE: &str =
  "sb_{scope}_{env}_{key}_{version}";

impl Default for SecretsConfig {
  fn default() -> SecretsConfig {
    SecretsConfig {
      engine: EngineConfig::default(),
      name_template: DEFAULT_NAME_TEMPLATE.to_string(),
      version_mode: VersionMode::default(),
      static_version: "v1".to_string(),
      labels: IndexMap::new(),
    }
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
  File,
  Env,
  AzureKv,
  Infisical,
  /// Anything else in `providers.order` is skipped.
  #[serde(other)]
  Unknown,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct FileProviderConfig {
  /// Additional JSON directories merged after the standard env
  /// locations. `{stackId}` / `{env}` placeholders apply.
  pub extra_json_dirs: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvProviderConfig {
  /// Globs of JSON files holding allowlist wildcard arrays.
  pub allowlist_file_search: Vec<String>,
}

impl Default for EnvProviderConfig {
  fn default() -> EnvProviderConfig {
    EnvProviderConfig {
      allowlist_file_search: vec![
        "stacks/{stackId}/use-envvars.json".to_string(),
        "stacks/all/use-envvars.json".to_string(),
      ],
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureKvConfig {
  pub enabled: bool,
  pub vault_url: String,
  pub tenant_id: String,
  pub client_id: String,
  /// Name of the env var holding the client secret.
  pub client_secret_env: String,
  /// Separator used in vault secret names in place of `__`.
  pub separator: String,
  /// Wildcard filter applied to keys after prefix stripping.
  pub include: Vec<String>,
  /// String replacements applied before canonicalization.
  pub replace: IndexMap<String, String>,
}

impl Default for AzureKvConfig {
  fn default() -> AzureKvConfig {
    AzureKvConfig {
      enabled: false,
      vault_url: String::new(),
      tenant_id: String::new(),
      client_id: String::new(),
      client_secret_env: "AZURE_CLIENT_SECRET".to_string(),
      separator: "--".to_string(),
      include: Vec::new(),
      replace: IndexMap::new(),
    }
  }
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Default, PartialEq,
)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfig {
  /// First-hit wildcard patterns against the canonical key.
  #[serde(rename = "match")]
  pub patterns: Vec<String>,
  pub read_paths: Vec<String>,
  pub write_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InfisicalConfig {
  pub enabled: bool,
  pub base_url: String,
  pub project_id: String,
  /// Remote environment slug; defaults to the render env.
  pub environment: Option<String>,
  /// Ordered routing rules; falls back to `pathTemplate`.
  pub routes: Vec<RouteConfig>,
  pub path_template: String,
  /// Wildcard filter applied to returned keys.
  pub include: Vec<String>,
  /// String replacements applied before canonicalization.
  pub replace: IndexMap<String, String>,
  /// Rendering of the remote key, e.g. `"{key}"`.
  pub key_template: String,
}

impl Default for InfisicalConfig {
  fn default() -> InfisicalConfig {
    InfisicalConfig {
      enabled: false,
      base_url: "https://app.infisical.com".to_string(),
      project_id: String::new(),
      environment: None,
      routes: Vec::new(),
      path_template: "/{stackId}".to_string(),
      include: Vec::new(),
      replace: IndexMap::new(),
      key_template: "{key}".to_string(),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
  pub order: Vec<ProviderType>,
  pub file: FileProviderConfig,
  pub env: EnvProviderConfig,
  pub azure_kv: AzureKvConfig,
  pub infisical: InfisicalConfig,
}

impl Default for ProvidersConfig {
  fn default() -> ProvidersConfig {
    ProvidersConfig {
      order: vec![ProviderType::File, ProviderType::Env],
      file: FileProviderConfig::default(),
      env: EnvProviderConfig::default(),
      azure_kv: AzureKvConfig::default(),
      infisical: InfisicalConfig::default(),
    }
  }
}
