//! Env JSON collect: flatten `appsettings`-style JSON into the
//! context's env bag via the file provider.

use crate::{RenderContext, Result};

pub fn run(ctx: &mut RenderContext) -> Result<()> {
  providers::file::collect(
    &ctx.config.providers.file,
    &ctx.request.root,
    &ctx.request.stack_id,
    &ctx.request.env,
    &mut ctx.env,
  )?;
  Ok(())
}
