//! Worker tasks that back the runtime orchestration.
//!
//! The combat worker is the single serialization point for a shard: every
//! exchange, query and lifecycle timer goes through its command channel.

mod combat;

pub use combat::{Command, CombatWorker};
