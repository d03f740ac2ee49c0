//! Template load: seed the working model from
//! `stacks/<stackId>/docker-stack.template.yml` (or `.yaml`).

use compose::ComposeFile;
use tracing::debug;

use crate::{Error, RenderContext, Result};

const TEMPLATE_FILE_NAMES: [&str; 2] = [
  "docker-stack.template.yml",
  "docker-stack.template.yaml",
];

pub fn load(ctx: &mut RenderContext) -> Result<()> {
  let stack_dir = ctx
    .request
    .root
    .join("stacks")
    .join(&ctx.request.stack_id);
  let Some(path) = TEMPLATE_FILE_NAMES
    .iter()
    .map(|name| stack_dir.join(name))
    .find(|path| path.is_file())
  else {
    return Err(Error::TemplateMissing {
      stack_id: ctx.request.stack_id.clone(),
      searched: stack_dir,
    });
  };
  debug!("template at {}", path.display());
  // parsed twice: the reference copy stays untouched while the
  // working copy takes every mutation
  ctx.template = files::read_yaml::<ComposeFile>(&path)?;
  ctx.working = files::read_yaml::<ComposeFile>(&path)?;
  ctx.template_path = path;
  Ok(())
}
