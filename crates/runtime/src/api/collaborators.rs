//! Capability interfaces for the services an exchange depends on.
//!
//! Each collaborator is injected into the runtime at build time. Async
//! collaborators are awaited inside the exchange; a failure is caught by the
//! orchestrator and degraded to a safe default, never unwinding damage that
//! was already applied.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use combat_core::{
    AbilityMeta, EntityId, Position, ProgressionGain, PrototypeId, RegionId, SpawnPointId,
    ZoneRef,
};

use super::errors::CollaboratorError;

// ============================================================================
// Damage engine
// ============================================================================

/// Attacker descriptor handed to the damage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSource {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub weapon_skill: u32,
    /// Prototype base damage for NPC attackers.
    pub base_damage: Option<u32>,
    pub ability: Option<AbilityMeta>,
}

/// Defender descriptor handed to the damage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageTarget {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageOptions {
    pub damage_multiplier: Option<f64>,
    pub flat_bonus: Option<u32>,
    pub crit_chance: Option<f64>,
    pub glancing_chance: Option<f64>,
    /// The runtime applies damage-taken modifiers itself in the pipeline and
    /// always passes `false`.
    pub apply_defender_damage_taken_mods: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub damage: u32,
    pub was_crit: bool,
    pub was_glancing: bool,
}

/// Computes raw damage numbers. The formula itself lives outside this crate.
#[async_trait]
pub trait DamageEngine: Send + Sync {
    async fn compute_damage(
        &self,
        source: &DamageSource,
        target: &DamageTarget,
        options: &DamageOptions,
    ) -> Result<DamageRoll, CollaboratorError>;
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    pub item_id: String,
    pub drop_chance: f64,
    pub min_qty: u32,
    pub max_qty: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardTable {
    pub xp: u64,
    pub drops: Vec<DropEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub item_id: String,
    pub quantity: u32,
}

/// Rolled rewards for one kill, handed back to the reward source for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub recipient: EntityId,
    pub npc: EntityId,
    pub prototype: PrototypeId,
    pub xp: u64,
    pub items: Vec<ItemDrop>,
}

/// XP and loot for dead NPCs. Delivery and overflow policy are its own
/// responsibility.
#[async_trait]
pub trait RewardSource: Send + Sync {
    async fn rewards_for(&self, prototype: PrototypeId) -> Result<RewardTable, CollaboratorError>;

    async fn grant(&self, grant: &RewardGrant) -> Result<(), CollaboratorError>;
}

/// Reward source that hands out nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewards;

#[async_trait]
impl RewardSource for NoRewards {
    async fn rewards_for(&self, _prototype: PrototypeId) -> Result<RewardTable, CollaboratorError> {
        Ok(RewardTable::default())
    }

    async fn grant(&self, _grant: &RewardGrant) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

// ============================================================================
// Zone policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySubject {
    pub id: EntityId,
    pub level: u32,
    pub is_npc: bool,
    pub region: RegionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Zone/region combat rules.
#[async_trait]
pub trait ZonePolicy: Send + Sync {
    /// Consulted on every player-initiated exchange.
    async fn can_damage(
        &self,
        attacker: &PolicySubject,
        target: &PolicySubject,
        zone: ZoneRef,
    ) -> Result<PolicyDecision, CollaboratorError>;

    /// Backstop used only by the low-level damage applier. Skips zone-flag
    /// lookups, so it must not replace [`ZonePolicy::can_damage`].
    fn can_damage_fast(&self, _attacker: EntityId, _target: EntityId) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllZones;

#[async_trait]
impl ZonePolicy for AllowAllZones {
    async fn can_damage(
        &self,
        _attacker: &PolicySubject,
        _target: &PolicySubject,
        _zone: ZoneRef,
    ) -> Result<PolicyDecision, CollaboratorError> {
        Ok(PolicyDecision::allow())
    }
}

// ============================================================================
// Spawn points
// ============================================================================

/// Live spawn-point positions, read at respawn time.
pub trait SpawnPointCache: Send + Sync {
    fn spawn_point(&self, id: SpawnPointId) -> Option<Position>;
}

/// Shared in-process spawn-point table. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpawnPoints {
    points: Arc<RwLock<HashMap<SpawnPointId, Position>>>,
}

impl InMemorySpawnPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or relocates a spawn point.
    pub fn set(&self, id: SpawnPointId, position: Position) {
        if let Ok(mut points) = self.points.write() {
            points.insert(id, position);
        }
    }

    pub fn remove(&self, id: SpawnPointId) -> Option<Position> {
        self.points.write().ok()?.remove(&id)
    }
}

impl SpawnPointCache for InMemorySpawnPoints {
    fn spawn_point(&self, id: SpawnPointId) -> Option<Position> {
        self.points.read().ok()?.get(&id).copied()
    }
}

// ============================================================================
// Room broadcast
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub id: EntityId,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub id: EntityId,
    pub prototype: PrototypeId,
    pub name: String,
    pub position: Position,
    /// The dead instance this one replaces.
    pub replaces: Option<EntityId>,
}

/// Emits entity updates, lifecycle changes and flavor lines to a region.
/// Delivery is best-effort.
pub trait RoomBroadcaster: Send + Sync {
    fn entity_update(&self, region: RegionId, update: EntityUpdate);

    fn entity_spawned(&self, region: RegionId, spawn: EntitySpawn);

    fn entity_despawned(&self, region: RegionId, id: EntityId);

    fn flavor(&self, region: RegionId, line: String);
}

// ============================================================================
// Progression
// ============================================================================

/// Persists attacker skill/resource gains.
#[async_trait]
pub trait ProgressionSink: Send + Sync {
    async fn record(
        &self,
        combatant: EntityId,
        gain: ProgressionGain,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardProgression;

#[async_trait]
impl ProgressionSink for DiscardProgression {
    async fn record(
        &self,
        _combatant: EntityId,
        _gain: ProgressionGain,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Every collaborator an exchange may call.
#[derive(Clone)]
pub struct Collaborators {
    pub damage: Arc<dyn DamageEngine>,
    pub rewards: Arc<dyn RewardSource>,
    pub zone: Arc<dyn ZonePolicy>,
    pub spawn_points: Arc<dyn SpawnPointCache>,
    pub room: Arc<dyn RoomBroadcaster>,
    pub progression: Arc<dyn ProgressionSink>,
}
