//! Groups apply: merge per-group service fragments into every
//! service declaring membership via `x-sb-groups`.

use compose::Service;
use tracing::debug;

use crate::{RenderContext, Result};

fn fragment_paths(
  ctx: &RenderContext,
  group: &str,
) -> Vec<std::path::PathBuf> {
  let mut paths = Vec::new();
  for scope in ["all", ctx.request.stack_id.as_str()] {
    for name in ["service.yml", "service.yaml"] {
      let path = ctx
        .request
        .root
        .join("stacks")
        .join(scope)
        .join(&ctx.request.env)
        .join("groups")
        .join(group)
        .join(name);
      if path.is_file() {
        paths.push(path);
        // .yml shadows .yaml within one scope
        break;
      }
    }
  }
  paths
}

/// A bare `replicas` on a fragment belongs under
/// `deploy.replicas`.
fn lift_replicas(fragment: &mut Service) {
  let Some(value) = fragment.custom.shift_remove("replicas")
  else {
    return;
  };
  let Some(replicas) = value.as_i64() else {
    return;
  };
  fragment
    .deploy
    .get_or_insert_with(Default::default)
    .replicas = Some(replicas);
}

pub fn apply(ctx: &mut RenderContext) -> Result<()> {
  let members = ctx
    .working
    .services
    .iter()
    .filter(|(_, service)| !service.x_sb_groups.is_empty())
    .map(|(name, service)| {
      (name.clone(), service.x_sb_groups.clone())
    })
    .collect::<Vec<_>>();

  for (service_name, groups) in members {
    for group in groups {
      for path in fragment_paths(ctx, &group) {
        let mut fragment: Service = files::read_yaml(&path)?;
        lift_replicas(&mut fragment);
        debug!(
          "group '{group}' fragment {} into '{service_name}'",
          path.display()
        );
        if let Some(service) =
          ctx.working.services.get_mut(&service_name)
        {
          service.merge_from(fragment);
        }
      }
    }
  }
  Ok(())
}
