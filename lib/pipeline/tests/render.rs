//! End-to-end renders against fixture repositories.

use std::{fs, path::Path};

use config::SbConfig;
use pipeline::{PipelineMode, RenderRequest};
use pretty_assertions::assert_eq;

fn write(root: &Path, rel: &str, contents: &str) {
  let path = root.join(rel);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, contents).unwrap();
}

fn request(root: &Path, config: &SbConfig) -> RenderRequest {
  RenderRequest {
    root: root.to_path_buf(),
    stack_id: "app".to_string(),
    env: "dev".to_string(),
    appsettings_mode: config.render.appsettings_mode,
    out_dir: config.render.out_dir.clone(),
    write_history: config.render.write_history,
  }
}

async fn render(root: &Path) -> pipeline::RenderContext {
  let config = SbConfig::load(root).unwrap();
  pipeline::run(
    request(root, &config),
    config,
    PipelineMode::StackRender,
  )
  .await
  .unwrap()
}

fn rendered_yaml(ctx: &pipeline::RenderContext) -> String {
  fs::read_to_string(ctx.out_file_path.as_ref().unwrap())
    .unwrap()
}

const FILE_ONLY_PROVIDERS: &str = "providers:\n  order: [file]\n";

#[tokio::test]
async fn wildcard_overlay_applies_to_every_service() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine:3.20\n",
  );
  write(
    root,
    "stacks/all/dev/stack/log.yml",
    "services:\n  '*':\n    logging:\n      driver: json-file\n",
  );

  let ctx = render(root).await;
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  assert!(!out.services.contains_key("*"));
  assert_eq!(
    out.services["api"]
      .logging
      .as_ref()
      .unwrap()
      .driver
      .as_deref(),
    Some("json-file")
  );
  assert!(ctx.warnings.is_empty());
}

#[tokio::test]
async fn secretize_replaces_env_with_external_secret() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "secretize:\n  enabled: true\n  paths: [\"ConnectionStrings__*\"]\nsecrets:\n  versionMode: static\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine:3.20\n",
  );
  write(
    root,
    "stacks/app/dev/env/conn.json",
    r#"{"ConnectionStrings":{"Main":"Server=db;"}}"#,
  );

  let ctx = render(root).await;
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  let name = "sb_app_api_dev_ConnectionStrings__Main_v1";

  let api = &out.services["api"];
  let env = api.environment_map();
  assert!(!env.contains_key("ConnectionStrings__Main"));
  assert!(!env.contains_key("ConnectionStrings.Main"));

  let def = &out.secrets[name];
  assert!(def.external);
  assert_eq!(def.name.as_deref(), Some(name));

  assert_eq!(api.secrets.len(), 1);
  match &api.secrets[0] {
    compose::FileRef::Long(long) => {
      assert_eq!(long.source, name);
      assert_eq!(
        long.target.as_deref(),
        Some("ConnectionStrings__Main")
      );
      assert_eq!(long.mode, Some(0o444));
    }
    compose::FileRef::Short(_) => panic!("expected long ref"),
  }
}

#[tokio::test]
async fn tokens_expand_in_both_syntaxes() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "tokens:\n  user:\n    COMPANY_NAME: acme\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: \"registry/${COMPANY_NAME}/api:{{SB_ENV}}\"\n",
  );

  let config = SbConfig::load(root).unwrap();
  let mut req = request(root, &config);
  req.env = "prod".to_string();
  let ctx =
    pipeline::run(req, config, PipelineMode::StackRender)
      .await
      .unwrap();
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  assert_eq!(
    out.services["api"].image.as_deref(),
    Some("registry/acme/api:prod")
  );
}

#[tokio::test]
async fn named_overlay_beats_wildcard_without_duplicates() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine:3.20\n",
  );
  write(
    root,
    "stacks/all/dev/stack/env.yml",
    "services:\n  '*':\n    environment:\n      FOO: '1'\n  api:\n    environment:\n      FOO: '2'\n",
  );

  let ctx = render(root).await;
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  match out.services["api"].environment.as_ref().unwrap() {
    compose::ListOrDict::List(items) => {
      assert_eq!(items, &vec!["FOO=2".to_string()]);
    }
    compose::ListOrDict::Dict(_) => {
      panic!("environment must emit in list form")
    }
  }
}

#[tokio::test]
async fn environment_emits_as_sorted_string_list() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n    environment:\n      Z_FLAG: true\n      A_PORT: 8080\n",
  );
  write(
    root,
    "stacks/app/dev/env/extra.json",
    r#"{"M":{"Nested":false}}"#,
  );

  let ctx = render(root).await;
  let yaml = rendered_yaml(&ctx);
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&yaml).unwrap();
  match out.services["api"].environment.as_ref().unwrap() {
    compose::ListOrDict::List(items) => {
      assert_eq!(
        items,
        &vec![
          "A_PORT=8080".to_string(),
          "M__Nested=false".to_string(),
          "Z_FLAG=true".to_string(),
        ]
      );
    }
    compose::ListOrDict::Dict(_) => {
      panic!("environment must emit in list form")
    }
  }
  // list form keeps the emitter from producing bare booleans
  assert!(yaml.contains("Z_FLAG=true"));
  assert!(!yaml.contains("Z_FLAG: true"));
}

#[tokio::test]
async fn rerender_with_static_version_is_byte_identical() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "secretize:\n  enabled: true\n  paths: [\"Secret__*\"]\nsecrets:\n  versionMode: static\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n  worker:\n    image: alpine\n",
  );
  write(
    root,
    "stacks/app/dev/env/s.json",
    r#"{"Secret":{"Token":"t"},"Plain":"p"}"#,
  );

  let first = rendered_yaml(&render(root).await);
  let second = rendered_yaml(&render(root).await);
  assert_eq!(first, second);
}

#[tokio::test]
async fn config_export_drops_secretized_keys_and_unflattens() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "render:\n  appsettingsMode: config\nsecretize:\n  enabled: true\n  paths: [\"X__*\"]\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/s/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n",
  );
  write(
    root,
    "stacks/s/dev/env/s.json",
    r#"{"A":{"B":"1"},"C":{"D":"two"},"X":{"Secret":"hidden"}}"#,
  );

  let config = SbConfig::load(root).unwrap();
  let mut req = request(root, &config);
  req.stack_id = "s".to_string();
  let ctx =
    pipeline::run(req, config, PipelineMode::ConfigExport)
      .await
      .unwrap();
  let out_path = ctx.out_file_path.as_ref().unwrap();
  assert!(out_path.ends_with("out/s-dev.appsettings.json"));
  let exported: serde_json::Value = serde_json::from_str(
    &fs::read_to_string(out_path).unwrap(),
  )
  .unwrap();
  assert_eq!(
    exported,
    serde_json::json!({"A":{"B":"1"},"C":{"D":"two"}})
  );
}

#[tokio::test]
async fn group_fragments_merge_in_scope_order() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n    x-sb-groups: [web]\n",
  );
  write(
    root,
    "stacks/all/dev/groups/web/service.yml",
    "replicas: 2\nlabels:\n  tier: web\n",
  );
  write(
    root,
    "stacks/app/dev/groups/web/service.yml",
    "replicas: 3\n",
  );

  let ctx = render(root).await;
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  let api = &out.services["api"];
  assert_eq!(
    api.deploy.as_ref().unwrap().replicas,
    Some(3)
  );
  assert!(api.x_sb_groups.is_empty());
  assert_eq!(api.labels.as_ref().unwrap().to_map()["tier"], "web");
}

#[tokio::test]
async fn x_sb_labels_land_sorted_in_deploy_labels() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "x-sb:\n  labels:\n    com.example.team: platform\nservices:\n  api:\n    image: alpine\n    x-sb:\n      labels:\n        com.example.team: api\n        com.example.tier: backend\n",
  );

  let ctx = render(root).await;
  let out: compose::ComposeFile =
    serde_yaml_ng::from_str(&rendered_yaml(&ctx)).unwrap();
  let api = &out.services["api"];
  match api.deploy.as_ref().unwrap().labels.as_ref().unwrap() {
    compose::ListOrDict::List(items) => {
      assert_eq!(
        items,
        &vec![
          "com.example.team=api".to_string(),
          "com.example.tier=backend".to_string(),
        ]
      );
    }
    compose::ListOrDict::Dict(_) => {
      panic!("labels must emit in list form")
    }
  }
  // x-sb blocks are stripped from the artifact
  assert!(!api.custom.contains_key("x-sb"));
  assert!(!out.custom.contains_key("x-sb"));
}

#[tokio::test]
async fn missing_template_is_fatal() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "ops/sb.yml", FILE_ONLY_PROVIDERS);
  let config = SbConfig::load(root).unwrap();
  let err = pipeline::run(
    request(root, &config),
    config,
    PipelineMode::StackRender,
  )
  .await
  .unwrap_err();
  assert!(matches!(
    err,
    pipeline::Error::TemplateMissing { .. }
  ));
  assert!(err.is_user_error());
}

#[tokio::test]
async fn write_history_snapshots_the_artifact() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "render:\n  writeHistory: true\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n",
  );

  let ctx = render(root).await;
  let history = ctx.history_file_path.as_ref().unwrap();
  assert!(history.starts_with(root.join("ops/state/history")));
  assert_eq!(
    fs::read_to_string(history).unwrap(),
    rendered_yaml(&ctx)
  );
}

#[tokio::test]
async fn strict_overlay_conflict_aborts() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "ops/sb.yml",
    "render:\n  strictOverlays: true\nproviders:\n  order: [file]\n",
  );
  write(
    root,
    "stacks/app/docker-stack.template.yml",
    "services:\n  api:\n    image: alpine\n",
  );
  write(
    root,
    "stacks/all/dev/stack/10-a.yml",
    "services:\n  api:\n    user: alice\n",
  );
  write(
    root,
    "stacks/all/dev/stack/20-b.yml",
    "services:\n  api:\n    user: bob\n",
  );

  let config = SbConfig::load(root).unwrap();
  let err = pipeline::run(
    request(root, &config),
    config,
    PipelineMode::StackRender,
  )
  .await
  .unwrap_err();
  assert!(matches!(
    err,
    pipeline::Error::OverlayConflict { .. }
  ));
}
