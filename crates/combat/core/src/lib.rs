//! Deterministic combat rules and NPC lifecycle logic.
//!
//! `combat-core` holds the canonical rules for one exchange between a
//! controlled actor and an NPC: the physical hit resolver, the ordered damage
//! pipeline, threat ledgers with assist propagation, and the corpse/respawn
//! state machine. Everything is synchronous; time and randomness are passed in
//! by the caller, so the same inputs always produce the same outcome. The
//! async runtime sequences these pieces and talks to external collaborators.
pub mod combat;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod rng;
pub mod state;
pub mod threat;

pub use combat::{
    AbilityMeta, Annotation, AttackerContext, AvoidanceBands, DamageChannel, DamageReport,
    HitResolution, Mitigation, Narration, ProgressionGain, Resists, SwingCapabilities,
    SwingFacts, SwingInput, SwingOutcome, apply_block, apply_damage, mitigate,
    mitigation_multiplier, narrate_swing, progression_for, resolve_swing,
};
pub use config::{
    AssistConfig, AssistStrength, CombatConfig, CowardiceConfig, DiminishingConfig,
    ExchangeConfig, GateConfig, LifecycleConfig, ThreatConfig,
};
pub use error::{CombatError, CombatFault, ErrorSeverity};
pub use lifecycle::{DeathSnapshot, Lifecycle, LifecycleError, LifecycleState, corpse_delay_ms};
pub use rng::{PcgRolls, RollSource, SequenceRolls, sanitize_roll};
pub use state::{
    Archetype, CombatRole, CombatWorld, Combatant, DrBucket, EffectTag, EntityId, FactionId,
    NpcPrototype, NpcState, NpcTags, Position, PrototypeId, RegionId, ShardId, SpawnMeta,
    SpawnPointId, StatusEffect, StatusEffects, Timestamp, ZoneRef,
};
pub use threat::{
    AssistPull, ForcedTarget, GateCast, GateDamage, GatePhase, ThreatLedger, poll_gate,
    propagate_assist, pull_distant_ally,
};
