//! Token expand: substitute `${NAME}` / `{{NAME}}` across every
//! scalar string in the model. Implicit tokens are overlaid by
//! `tokens.user`; `SB_SERVICE_NAME` binds per service.

use interpolate::Tokens;

use crate::RenderContext;

fn base_tokens(ctx: &RenderContext) -> Tokens {
  let mut tokens = Tokens::new();
  tokens.insert(
    "SB_STACK_ID".to_string(),
    ctx.request.stack_id.clone(),
  );
  tokens.insert("SB_ENV".to_string(), ctx.request.env.clone());
  for (key, value) in &ctx.config.tokens.user {
    tokens.insert(key.clone(), value.clone());
  }
  tokens
}

pub fn expand(ctx: &mut RenderContext) {
  let base = base_tokens(ctx);

  let service_names =
    ctx.working.services.keys().cloned().collect::<Vec<_>>();
  for service_name in service_names {
    let mut tokens = base.clone();
    tokens.insert(
      "SB_SERVICE_NAME".to_string(),
      service_name.clone(),
    );
    // user tokens stay on top of the implicit set
    for (key, value) in &ctx.config.tokens.user {
      tokens.insert(key.clone(), value.clone());
    }
    if let Some(service) =
      ctx.working.services.get_mut(&service_name)
    {
      service.visit_strings_mut(&mut |s| {
        interpolate::expand_in_place(s, &tokens)
      });
    }
  }

  ctx.working.visit_root_strings_mut(&mut |s| {
    interpolate::expand_in_place(s, &base)
  });
}
