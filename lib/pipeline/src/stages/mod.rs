pub mod emit;
pub mod env_apply;
pub mod env_collect;
pub mod groups;
pub mod labels;
pub mod overlay;
pub mod providers;
pub mod secrets_attach;
pub mod stringify;
pub mod template;
pub mod tokens;
