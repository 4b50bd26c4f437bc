#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use combat_content::PrototypeCatalog;
use combat_core::{
    CombatConfig, FactionId, NpcPrototype, NpcTags, PrototypeId, SequenceRolls,
    SwingCapabilities, ZoneRef,
};
use runtime::{
    CollaboratorError, CollaboratorKind, DamageEngine, DamageOptions, DamageRoll, DamageSource,
    DamageTarget, Event, PolicyDecision, PolicySubject, RewardGrant, RewardSource, RewardTable,
    Runtime, RuntimeBuilder, ZonePolicy,
};

pub const WOLF: PrototypeId = PrototypeId(1);
pub const DEFENDER: PrototypeId = PrototypeId(2);
pub const ORE: PrototypeId = PrototypeId(3);
pub const VENDOR: PrototypeId = PrototypeId(4);
pub const GUARD: PrototypeId = PrototypeId(5);
pub const BRAWLER: PrototypeId = PrototypeId(6);
pub const HARE: PrototypeId = PrototypeId(7);
pub const SHAMAN: PrototypeId = PrototypeId(8);
pub const WARDEN: PrototypeId = PrototypeId(9);

/// Damage engine that always rolls the same number.
#[derive(Debug, Clone, Copy)]
pub struct FixedDamage(pub u32);

#[async_trait]
impl DamageEngine for FixedDamage {
    async fn compute_damage(
        &self,
        _source: &DamageSource,
        _target: &DamageTarget,
        _options: &DamageOptions,
    ) -> Result<DamageRoll, CollaboratorError> {
        Ok(DamageRoll {
            damage: self.0,
            was_crit: false,
            was_glancing: false,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BrokenDamage;

#[async_trait]
impl DamageEngine for BrokenDamage {
    async fn compute_damage(
        &self,
        _source: &DamageSource,
        _target: &DamageTarget,
        _options: &DamageOptions,
    ) -> Result<DamageRoll, CollaboratorError> {
        Err(CollaboratorError::new(
            CollaboratorKind::DamageEngine,
            "formula service unreachable",
        ))
    }
}

/// Reward source that records every grant it is asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct RecordingRewards {
    pub xp: u64,
    pub fail_grant: bool,
    pub grants: Arc<Mutex<Vec<RewardGrant>>>,
}

impl RecordingRewards {
    pub fn granting(xp: u64) -> Self {
        Self {
            xp,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_grant: true,
            ..Self::default()
        }
    }

    pub fn grants(&self) -> Vec<RewardGrant> {
        self.grants.lock().expect("grants lock").clone()
    }
}

#[async_trait]
impl RewardSource for RecordingRewards {
    async fn rewards_for(&self, _prototype: PrototypeId) -> Result<RewardTable, CollaboratorError> {
        Ok(RewardTable {
            xp: self.xp,
            drops: Vec::new(),
        })
    }

    async fn grant(&self, grant: &RewardGrant) -> Result<(), CollaboratorError> {
        if self.fail_grant {
            return Err(CollaboratorError::new(
                CollaboratorKind::RewardSource,
                "inventory service down",
            ));
        }
        self.grants.lock().expect("grants lock").push(grant.clone());
        Ok(())
    }
}

/// Zone policy that denies everything, optionally without a reason.
#[derive(Debug, Clone)]
pub struct DenyZone(pub Option<&'static str>);

#[async_trait]
impl ZonePolicy for DenyZone {
    async fn can_damage(
        &self,
        _attacker: &PolicySubject,
        _target: &PolicySubject,
        _zone: ZoneRef,
    ) -> Result<PolicyDecision, CollaboratorError> {
        Ok(match self.0 {
            Some(reason) => PolicyDecision::deny(reason),
            None => PolicyDecision {
                allowed: false,
                reason: None,
            },
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BrokenZone;

#[async_trait]
impl ZonePolicy for BrokenZone {
    async fn can_damage(
        &self,
        _attacker: &PolicySubject,
        _target: &PolicySubject,
        _zone: ZoneRef,
    ) -> Result<PolicyDecision, CollaboratorError> {
        Err(CollaboratorError::new(CollaboratorKind::ZonePolicy, "zone flags unavailable"))
    }
}

pub fn catalog() -> PrototypeCatalog {
    [
        NpcPrototype::new(WOLF, "Gray Wolf", 1, 8).with_tags(NpcTags::BEAST | NpcTags::NO_COUNTER),
        NpcPrototype::new(DEFENDER, "Keep Defender", 10, 100).with_tags(NpcTags::NO_COUNTER),
        NpcPrototype::new(ORE, "Copper Vein", 1, 8).with_tags(NpcTags::RESOURCE | NpcTags::NO_COUNTER),
        NpcPrototype::new(VENDOR, "Vendor", 5, 50).with_tags(NpcTags::SERVICE_PROVIDER),
        NpcPrototype::new(GUARD, "Town Guard", 5, 100)
            .with_tags(NpcTags::ASSIST | NpcTags::NO_COUNTER)
            .with_faction(FactionId(1)),
        NpcPrototype::new(BRAWLER, "Brawler", 1, 100).with_base_damage(2),
        NpcPrototype::new(HARE, "Skittish Hare", 1, 100).with_tags(NpcTags::COWARD),
        NpcPrototype::new(SHAMAN, "Kobold Shaman", 5, 100)
            .with_tags(NpcTags::GATE_CALLER | NpcTags::NO_COUNTER)
            .with_faction(FactionId(2)),
        NpcPrototype::new(WARDEN, "Kobold Warden", 5, 100)
            .with_tags(NpcTags::ASSIST | NpcTags::NO_COUNTER)
            .with_faction(FactionId(2)),
    ]
    .into_iter()
    .collect()
}

/// Short corpse and respawn timers so paused-time tests stay readable.
pub fn fast_lifecycle() -> CombatConfig {
    let mut config = CombatConfig::default();
    config.lifecycle.corpse_ms = 1_000;
    config.lifecycle.beast_corpse_ms = 1_000;
    config.lifecycle.resource_corpse_ms = 500;
    config.lifecycle.respawn_ms = 2_000;
    config
}

/// Every swing lands as a plain single-strike hit.
pub fn sure_hit() -> SwingCapabilities {
    SwingCapabilities::empty()
}

/// Every swing that connects is parried.
pub fn always_parried() -> SwingCapabilities {
    SwingCapabilities::PARRY
}

pub fn builder() -> RuntimeBuilder {
    Runtime::builder()
        .combat_config(fast_lifecycle())
        .catalog(catalog())
        .damage_engine(FixedDamage(8))
        .rolls(SequenceRolls::new(vec![0.0]))
}

/// Next event, or `None` if nothing arrives within `within`.
pub async fn next_event(rx: &mut broadcast::Receiver<Event>, within: Duration) -> Option<Event> {
    tokio::time::timeout(within, rx.recv()).await.ok()?.ok()
}
