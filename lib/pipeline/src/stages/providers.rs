//! Providers aggregate: run the configured provider chain
//! against the env bag. Provider failures downgrade to warnings.

use crate::RenderContext;

pub async fn run(ctx: &mut RenderContext) {
  let warnings = providers::aggregate(
    &ctx.config.providers,
    &ctx.request.root,
    &ctx.request.stack_id,
    &ctx.request.env,
    &mut ctx.env,
  )
  .await;
  ctx.warnings.extend(warnings);
}
