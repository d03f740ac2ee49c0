use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Failed to read {path} | {e:?}")]
  Io { e: std::io::Error, path: PathBuf },

  #[error("Invalid YAML at {path} | {e}")]
  InvalidYaml {
    e: serde_yaml_ng::Error,
    path: PathBuf,
  },

  #[error("Invalid JSON at {path} | {e}")]
  InvalidJson {
    e: serde_json::Error,
    path: PathBuf,
  },
}
