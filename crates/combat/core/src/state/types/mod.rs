//! Core data types for the combat arena.

mod combatant;
mod common;
mod npc;
mod status;

pub use combatant::{CombatRole, Combatant};
pub use common::{
    EntityId, FactionId, Position, PrototypeId, RegionId, ShardId, SpawnPointId, Timestamp,
    ZoneRef,
};
pub use npc::{Archetype, NpcPrototype, NpcState, NpcTags, SpawnMeta};
pub use status::{DrBucket, EffectTag, StatusEffect, StatusEffects};
