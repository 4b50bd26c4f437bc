//! Async runtime for one shard's combat exchanges.
//!
//! This crate sequences the synchronous rules in `combat-core` against the
//! outside world: damage engines, reward tables, zone policies, spawn-point
//! caches and room broadcasts. Consumers embed [`Runtime`] and talk to it
//! through a cloneable [`CombatHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the handle, the collaborator interfaces, and errors
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`exchange`] runs one attack exchange against a borrowed world
//! - `workers` keeps the combat worker internal to the crate
pub mod api;
pub mod events;
pub mod exchange;
pub mod runtime;

mod scheduler;
mod workers;

pub use api::{
    AllowAllZones, AssistTarget, CollaboratorError, CollaboratorKind, Collaborators,
    CombatHandle, DamageEngine, DamageOptions, DamageRoll, DamageSource, DamageTarget,
    DiscardProgression, DropEntry, EntitySpawn, EntityUpdate, InMemorySpawnPoints, ItemDrop,
    NoRewards, NpcSpawn, PolicyDecision, PolicySubject, ProgressionSink, Result, RewardGrant,
    RewardSource, RewardTable, RoomBroadcaster, RuntimeError, SpawnPointCache, StepOutcome,
    TickReport, ZonePolicy,
};
pub use events::{CombatEvent, Event, EventBus, LifecycleEvent, RoomEvent, Topic};
pub use exchange::{
    AttackOrchestrator, AttackRequest, DEFAULT_DENIAL, DeathHandling, ExchangeContext,
    ExchangeOutcome, ExchangeReport, HitReport, SwingSummary, roll_drops,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use scheduler::{LifecycleStage, PendingTimer, RuntimeClock};
