use anyhow::Context;

use crate::EXIT_OK;

pub mod render;
pub mod secret;

pub fn print_config(
  sb_config: &config::SbConfig,
  unsanitized: bool,
) -> anyhow::Result<u8> {
  let config = if unsanitized {
    sb_config.clone()
  } else {
    sb_config.sanitized()
  };
  println!(
    "{}",
    serde_yaml_ng::to_string(&config)
      .context("Failed to serialize config for print")?
  );
  Ok(EXIT_OK)
}
