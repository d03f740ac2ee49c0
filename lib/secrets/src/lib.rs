//! # SwarmBender secrets
//!
//! Everything between an env key and a Swarm secret: wildcard
//! matching of secretizable keys, deterministic external naming,
//! discovery of the desired secret set, the Swarm secret engine
//! (Docker Engine API or CLI), and sync against the engine and a
//! remote store.

pub mod discovery;
pub mod engine;
pub mod matcher;
pub mod naming;
pub mod sync;

pub use discovery::{DesiredSecret, discover};
pub use engine::SecretEngine;
pub use matcher::SecretizeMatcher;
pub use naming::{NameParts, external_name, version_token};
