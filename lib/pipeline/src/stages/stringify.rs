//! Env stringify: coerce every service environment into a list
//! of `KEY=value` strings. List form keeps the YAML emitter from
//! reinterpreting booleans and numbers on the way out.

use compose::ListOrDict;

use crate::RenderContext;

fn normalize_item(item: &str) -> String {
  if item.contains('=') {
    item.to_string()
  } else {
    format!("{item}=")
  }
}

pub fn run(ctx: &mut RenderContext) {
  for service in ctx.working.services.values_mut() {
    let Some(environment) = service.environment.as_ref() else {
      continue;
    };
    if environment.is_empty() {
      service.environment = None;
      continue;
    }
    let list = match environment {
      // map form gets a deterministic ASCII-sorted rendering
      ListOrDict::Dict(_) => environment.to_sorted_list(),
      // list form keeps author order, items normalized
      ListOrDict::List(items) => {
        items.iter().map(|item| normalize_item(item)).collect()
      }
    };
    service.environment = Some(ListOrDict::List(list));
  }
}
