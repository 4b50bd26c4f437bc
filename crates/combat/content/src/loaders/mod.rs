//! Content loaders for reading combat data from files.
//!
//! Configuration is TOML, prototypes are RON. Both surface errors through
//! `anyhow` with the offending path in the message.

pub mod config;
pub mod prototypes;

pub use config::ConfigLoader;
pub use prototypes::PrototypeLoader;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
