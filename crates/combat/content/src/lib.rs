//! Data-driven combat content and loaders.
//!
//! This crate provides:
//! - the NPC prototype catalog consumed by the runtime at spawn and respawn time
//! - a TOML loader for [`combat_core::CombatConfig`] with an environment overlay
//! - a RON loader for NPC prototypes
//!
//! Content never appears in combat state directly; the runtime copies a
//! prototype into each NPC it spawns.

pub mod catalog;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use catalog::PrototypeCatalog;

#[cfg(feature = "loaders")]
pub use loaders::{ConfigLoader, PrototypeLoader};
