//! Environment apply: overlay the env bag onto each service's
//! `environment`, map form, last-wins.

use crate::RenderContext;

pub fn run(ctx: &mut RenderContext) {
  if ctx.env.is_empty() {
    return;
  }
  for service in ctx.working.services.values_mut() {
    let mut map = service.environment_map();
    for (key, value) in &ctx.env {
      map.insert(key.clone(), value.clone());
    }
    service.set_environment_map(map);
  }
}
