//! NPC prototypes and the per-NPC combat component.
//!
//! Prototypes are content definitions (loadable from RON through
//! `combat-content`); [`NpcState`] is the live component attached to a
//! spawned combatant and owns the threat ledger, gate cast and lifecycle.

use bitflags::bitflags;

use crate::combat::Mitigation;
use crate::lifecycle::Lifecycle;
use crate::state::{FactionId, Position, PrototypeId, RegionId, SpawnPointId, Timestamp};
use crate::threat::{GateCast, ThreatLedger};

/// Broad NPC class; scales assist strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Archetype {
    Trash,
    #[default]
    Normal,
    Elite,
    Guard,
    Boss,
}

bitflags! {
    /// Behavior tags carried by an NPC prototype.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct NpcTags: u16 {
        /// Corpse lingers longer for skinning.
        const BEAST = 1 << 0;
        /// Gathering node; per-owner, never respawned by the combat scheduler.
        const RESOURCE = 1 << 1;
        /// Vendor/trainer/banker style NPC; permanently invulnerable.
        const SERVICE_PROVIDER = 1 << 2;
        /// Flees instead of fighting back.
        const COWARD = 1 << 3;
        /// Never counter-attacks.
        const NO_COUNTER = 1 << 4;
        /// Answers calls for help from same-faction NPCs.
        const ASSIST = 1 << 5;
        /// Can cast "gate for help".
        const GATE_CALLER = 1 << 6;
    }
}

/// Content definition of an NPC.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NpcPrototype {
    pub id: PrototypeId,
    pub name: String,
    pub level: u32,
    pub max_hp: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mitigation: Mitigation,
    #[cfg_attr(feature = "serde", serde(default))]
    pub weapon_skill: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub defense_skill: Option<u32>,
    pub base_damage: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub archetype: Archetype,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: NpcTags,
    #[cfg_attr(feature = "serde", serde(default))]
    pub faction: FactionId,
}

impl NpcPrototype {
    pub fn new(id: PrototypeId, name: impl Into<String>, level: u32, max_hp: u32) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            max_hp,
            mitigation: Mitigation::default(),
            weapon_skill: level.saturating_mul(5),
            defense_skill: None,
            base_damage: 1,
            archetype: Archetype::Normal,
            tags: NpcTags::empty(),
            faction: FactionId::default(),
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: NpcTags) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.archetype = archetype;
        self
    }

    #[must_use]
    pub fn with_faction(mut self, faction: FactionId) -> Self {
        self.faction = faction;
        self
    }

    #[must_use]
    pub fn with_mitigation(mut self, mitigation: Mitigation) -> Self {
        self.mitigation = mitigation;
        self
    }

    #[must_use]
    pub fn with_defense_skill(mut self, points: u32) -> Self {
        self.defense_skill = Some(points);
        self
    }

    #[must_use]
    pub fn with_base_damage(mut self, damage: u32) -> Self {
        self.base_damage = damage;
        self
    }

    pub fn is_resource(&self) -> bool {
        self.tags.contains(NpcTags::RESOURCE)
    }
}

/// Where an NPC instance came from, captured at spawn time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnMeta {
    pub spawn_point: Option<SpawnPointId>,
    pub region: RegionId,
    /// Immutable home coordinates; never updated by movement.
    pub home: Position,
}

/// Live NPC component.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NpcState {
    pub prototype: NpcPrototype,
    pub spawn: SpawnMeta,
    /// Per-owner resource nodes record their owner.
    pub owner: Option<crate::state::EntityId>,
    pub threat: ThreatLedger,
    pub gate: GateCast,
    pub lifecycle: Lifecycle,
    pub last_swing_at: Option<Timestamp>,
}

impl NpcState {
    pub fn new(prototype: NpcPrototype, spawn: SpawnMeta, now: Timestamp) -> Self {
        Self {
            prototype,
            spawn,
            owner: None,
            threat: ThreatLedger::new(now),
            gate: GateCast::default(),
            lifecycle: Lifecycle::default(),
            last_swing_at: None,
        }
    }

    pub fn tags(&self) -> NpcTags {
        self.prototype.tags
    }

    pub fn archetype(&self) -> Archetype {
        self.prototype.archetype
    }

    /// Cowards and "no-counter" archetypes never swing back.
    pub fn can_counter(&self) -> bool {
        !self
            .prototype
            .tags
            .intersects(NpcTags::COWARD | NpcTags::NO_COUNTER)
    }
}
