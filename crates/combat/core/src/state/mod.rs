//! Combat state owned by this subsystem.
//!
//! Combat data is modelled as a component keyed by entity id inside
//! [`CombatWorld`], an arena owned by the runtime worker. Nothing outside the
//! arena holds references to combatants; lookups go through ids.
pub mod types;
mod world;

pub use types::{
    Archetype, CombatRole, Combatant, DrBucket, EffectTag, EntityId, FactionId, NpcPrototype,
    NpcState, NpcTags, Position, PrototypeId, RegionId, ShardId, SpawnMeta, SpawnPointId,
    StatusEffect, StatusEffects, Timestamp, ZoneRef,
};
pub use world::CombatWorld;
