use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(
    "No stack template for '{stack_id}': expected docker-stack.template.yml or .yaml under {searched}"
  )]
  TemplateMissing {
    stack_id: String,
    searched: PathBuf,
  },

  #[error(transparent)]
  File(#[from] files::Error),

  #[error(
    "Conflicting overlay values at '{key}': {previous_file} sets '{previous}', {current_file} sets '{current}'"
  )]
  OverlayConflict {
    key: String,
    previous: String,
    previous_file: PathBuf,
    current: String,
    current_file: PathBuf,
  },

  #[error("Failed to serialize output | {e}")]
  Serialize { e: serde_yaml_ng::Error },

  #[error("Failed to serialize appsettings | {e}")]
  SerializeJson { e: serde_json::Error },
}

impl Error {
  /// True when the failure points at the operator's inputs
  /// rather than the environment.
  pub fn is_user_error(&self) -> bool {
    matches!(
      self,
      Error::TemplateMissing { .. }
        | Error::File(
          files::Error::InvalidYaml { .. }
            | files::Error::InvalidJson { .. }
        )
        | Error::OverlayConflict { .. }
    )
  }
}
