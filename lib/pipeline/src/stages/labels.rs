//! Labels normalize: fold global and per-service `x-sb.labels`
//! into `deploy.labels`, emitted as a deterministic sorted list.

use compose::ListOrDict;
use indexmap::IndexMap;

use crate::RenderContext;

/// Read the `labels` mapping out of an `x-sb` extension block.
fn x_sb_labels(
  custom: &compose::YamlMap,
) -> IndexMap<String, String> {
  let mut out = IndexMap::new();
  let Some(serde_yaml_ng::Value::Mapping(block)) =
    custom.get("x-sb")
  else {
    return out;
  };
  let Some(serde_yaml_ng::Value::Mapping(labels)) =
    block.get("labels")
  else {
    return out;
  };
  for (key, value) in labels {
    let serde_yaml_ng::Value::String(key) = key else {
      continue;
    };
    out.insert(
      key.clone(),
      compose::variant::scalar_string(value.clone()),
    );
  }
  out
}

fn to_label_list(map: IndexMap<String, String>) -> Vec<String> {
  let mut keys = map.keys().cloned().collect::<Vec<_>>();
  keys.sort();
  keys
    .into_iter()
    .map(|key| {
      let value = &map[&key];
      if value.is_empty() {
        key
      } else {
        format!("{key}={value}")
      }
    })
    .collect()
}

pub fn normalize(ctx: &mut RenderContext) {
  let global = x_sb_labels(&ctx.working.custom);
  for service in ctx.working.services.values_mut() {
    let service_labels = x_sb_labels(&service.custom);
    if global.is_empty()
      && service_labels.is_empty()
      && service
        .deploy
        .as_ref()
        .and_then(|deploy| deploy.labels.as_ref())
        .is_none()
    {
      continue;
    }
    let deploy =
      service.deploy.get_or_insert_with(Default::default);
    let mut merged = deploy
      .labels
      .as_ref()
      .map(ListOrDict::to_map)
      .unwrap_or_default();
    merged.extend(global.clone());
    merged.extend(service_labels);
    deploy.labels =
      Some(ListOrDict::List(to_label_list(merged)));
  }
}
