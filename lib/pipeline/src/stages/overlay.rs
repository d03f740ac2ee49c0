//! Overlay apply: deep-merge per-env Compose overlays into the
//! working model, in configured pattern order and ASCII file
//! order within each pattern.

use std::path::{Path, PathBuf};

use compose::ComposeFile;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{Error, RenderContext, Result};

/// Scalar leaves of an overlay document, keyed by `/`-joined
/// path. Used to detect overlays in the same pattern disagreeing
/// on a value.
fn scalar_leaves(
  prefix: &str,
  value: &serde_yaml_ng::Value,
  out: &mut Vec<(String, String)>,
) {
  match value {
    serde_yaml_ng::Value::Mapping(map) => {
      for (key, entry) in map {
        let key = match key {
          serde_yaml_ng::Value::String(key) => key.clone(),
          other => format!("{other:?}"),
        };
        let path = if prefix.is_empty() {
          key
        } else {
          format!("{prefix}/{key}")
        };
        scalar_leaves(&path, entry, out);
      }
    }
    serde_yaml_ng::Value::Sequence(_)
    | serde_yaml_ng::Value::Null => {}
    scalar => {
      out.push((
        prefix.to_string(),
        compose::variant::scalar_string(scalar.clone()),
      ));
    }
  }
}

fn check_conflicts(
  ctx: &mut RenderContext,
  seen: &mut IndexMap<String, (String, PathBuf)>,
  value: &serde_yaml_ng::Value,
  path: &Path,
) -> Result<()> {
  let mut leaves = Vec::new();
  scalar_leaves("", value, &mut leaves);
  for (key, scalar) in leaves {
    match seen.get(&key) {
      Some((previous, previous_file))
        if *previous != scalar =>
      {
        let conflict = Error::OverlayConflict {
          key: key.clone(),
          previous: previous.clone(),
          previous_file: previous_file.clone(),
          current: scalar.clone(),
          current_file: path.to_path_buf(),
        };
        if ctx.config.render.strict_overlays {
          return Err(conflict);
        }
        warn!("{conflict}");
        ctx.warnings.push(conflict.to_string());
        seen.insert(key, (scalar, path.to_path_buf()));
      }
      Some(_) => {}
      None => {
        seen.insert(key, (scalar, path.to_path_buf()));
      }
    }
  }
  Ok(())
}

pub fn apply(ctx: &mut RenderContext) -> Result<()> {
  let patterns = ctx.config.render.overlay_order.clone();
  for pattern in patterns {
    let resolved = files::resolve_placeholders(
      &pattern,
      &ctx.request.stack_id,
      &ctx.request.env,
    );
    // conflicts are tracked per pattern: files under the same
    // glob are peers, later patterns legitimately override
    let mut seen = IndexMap::new();
    for path in files::glob_files(&ctx.request.root, &resolved) {
      let value: serde_yaml_ng::Value = files::read_yaml(&path)?;
      check_conflicts(ctx, &mut seen, &value, &path)?;
      let overlay: ComposeFile =
        serde_yaml_ng::from_value(value).map_err(|e| {
          files::Error::InvalidYaml {
            e,
            path: path.clone(),
          }
        })?;
      debug!("overlay {} applied", path.display());
      ctx.working.apply_overlay(overlay);
    }
  }
  Ok(())
}
