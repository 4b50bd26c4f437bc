//! Event types for different topics.

use serde::{Deserialize, Serialize};

use combat_core::{EntityId, RegionId};

use crate::api::{EntitySpawn, EntityUpdate};

/// Exchange results and entity health changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// A full exchange finished (including denied ones).
    ExchangeResolved {
        attacker: EntityId,
        target: EntityId,
        lines: Vec<String>,
        killed: bool,
    },

    /// Entity health/liveness update broadcast to its region.
    EntityUpdated {
        region: RegionId,
        update: EntityUpdate,
    },
}

/// Corpse and respawn transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Despawned { region: RegionId, npc: EntityId },
    Spawned { region: RegionId, spawn: EntitySpawn },
}

/// Free-form text for everyone in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub region: RegionId,
    pub line: String,
}
