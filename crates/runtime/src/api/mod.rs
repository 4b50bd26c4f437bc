//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate:
//! the handle, the collaborator interfaces the runtime is built from, and the
//! error types.

pub mod collaborators;
pub mod errors;
pub mod handle;

pub use collaborators::{
    AllowAllZones, Collaborators, DamageEngine, DamageOptions, DamageRoll, DamageSource,
    DamageTarget, DiscardProgression, DropEntry, EntitySpawn, EntityUpdate, InMemorySpawnPoints,
    ItemDrop, NoRewards, PolicyDecision, PolicySubject, ProgressionSink, RewardGrant, RewardSource,
    RewardTable, RoomBroadcaster, SpawnPointCache, ZonePolicy,
};
pub use errors::{CollaboratorError, CollaboratorKind, Result, RuntimeError, StepOutcome};
pub use handle::{AssistTarget, CombatHandle, NpcSpawn, TickReport};
