//! Corpse and respawn lifecycle of an NPC instance.
//!
//! ```text
//! Alive ─▶ Dying ─▶ Corpse ─▶ Despawned ─┬─▶ Terminal        (resource nodes)
//!                                         └─▶ Respawning ─▶ Replaced { by }
//! ```
//!
//! `Alive → Dying` is the one-shot death guard: it succeeds once per instance
//! and every later attempt fails with [`LifecycleError::AlreadyScheduled`].
//! A respawn always produces a new instance with a new id; the old one ends
//! in `Replaced`.

use crate::config::LifecycleConfig;
use crate::error::{CombatFault, ErrorSeverity};
use crate::state::{EntityId, NpcTags, Position, PrototypeId, RegionId, SpawnPointId, Timestamp};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Alive,
    Dying,
    Corpse {
        despawn_at: Timestamp,
    },
    Despawned,
    Respawning {
        respawn_at: Timestamp,
    },
    Terminal,
    Replaced {
        by: EntityId,
    },
}

/// Spawn data captured at the moment of death, before anything is mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeathSnapshot {
    pub npc: EntityId,
    pub prototype: PrototypeId,
    pub spawn_point: Option<SpawnPointId>,
    pub region: RegionId,
    pub home: Position,
    pub tags: NpcTags,
    pub died_at: Timestamp,
}

impl DeathSnapshot {
    pub fn is_resource(&self) -> bool {
        self.tags.contains(NpcTags::RESOURCE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("lifecycle already scheduled (state: {state})")]
    AlreadyScheduled { state: LifecycleState },

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: &'static str,
    },

    #[error("resource nodes are never respawned by the combat scheduler")]
    ResourceRespawn,
}

impl CombatFault for LifecycleError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyScheduled { .. } => ErrorSeverity::Recoverable,
            Self::InvalidTransition { .. } | Self::ResourceRespawn => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyScheduled { .. } => "LIFECYCLE_ALREADY_SCHEDULED",
            Self::InvalidTransition { .. } => "LIFECYCLE_INVALID_TRANSITION",
            Self::ResourceRespawn => "LIFECYCLE_RESOURCE_RESPAWN",
        }
    }
}

/// Corpse visibility before despawn, by NPC class.
pub fn corpse_delay_ms(tags: NpcTags, config: &LifecycleConfig) -> u64 {
    if tags.contains(NpcTags::RESOURCE) {
        config.resource_corpse_ms
    } else if tags.contains(NpcTags::BEAST) {
        config.beast_corpse_ms
    } else {
        config.corpse_ms
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lifecycle {
    state: LifecycleState,
    death: Option<DeathSnapshot>,
}

impl Lifecycle {
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifecycleState::Alive
    }

    pub fn death(&self) -> Option<&DeathSnapshot> {
        self.death.as_ref()
    }

    fn invalid(&self, to: &'static str) -> LifecycleError {
        LifecycleError::InvalidTransition {
            from: self.state,
            to,
        }
    }

    /// The death guard. Valid exactly once.
    pub fn begin_dying(&mut self, snapshot: DeathSnapshot) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Alive {
            return Err(LifecycleError::AlreadyScheduled { state: self.state });
        }
        self.state = LifecycleState::Dying;
        self.death = Some(snapshot);
        Ok(())
    }

    /// `Dying → Corpse`; returns when the corpse should despawn.
    pub fn enter_corpse(&mut self, now: Timestamp, config: &LifecycleConfig) -> Result<Timestamp, LifecycleError> {
        let (LifecycleState::Dying, Some(death)) = (self.state, self.death) else {
            return Err(self.invalid("corpse"));
        };
        let despawn_at = now.plus_ms(corpse_delay_ms(death.tags, config));
        self.state = LifecycleState::Corpse { despawn_at };
        Ok(despawn_at)
    }

    /// `Corpse → Despawned`.
    pub fn despawn(&mut self) -> Result<(), LifecycleError> {
        if !matches!(self.state, LifecycleState::Corpse { .. }) {
            return Err(self.invalid("despawned"));
        }
        self.state = LifecycleState::Despawned;
        Ok(())
    }

    /// `Despawned → Terminal` for resource nodes, `Despawned → Respawning`
    /// for everything else. Returns the respawn time when one is due.
    pub fn after_despawn(
        &mut self,
        now: Timestamp,
        config: &LifecycleConfig,
    ) -> Result<Option<Timestamp>, LifecycleError> {
        let (LifecycleState::Despawned, Some(death)) = (self.state, self.death) else {
            return Err(self.invalid("respawning"));
        };
        if death.is_resource() {
            self.state = LifecycleState::Terminal;
            return Ok(None);
        }
        let respawn_at = now.plus_ms(config.respawn_ms);
        self.state = LifecycleState::Respawning { respawn_at };
        Ok(Some(respawn_at))
    }

    /// `Respawning → Replaced { by }`.
    pub fn complete_respawn(&mut self, by: EntityId) -> Result<DeathSnapshot, LifecycleError> {
        let (LifecycleState::Respawning { .. }, Some(death)) = (self.state, self.death) else {
            if self.death.is_some_and(|d| d.is_resource()) {
                return Err(LifecycleError::ResourceRespawn);
            }
            return Err(self.invalid("replaced"));
        };
        self.state = LifecycleState::Replaced { by };
        Ok(death)
    }

    /// Ends the lifecycle without a respawn (cancelled, spawn point gone).
    pub fn terminate(&mut self) {
        self.state = LifecycleState::Terminal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tags: NpcTags) -> DeathSnapshot {
        DeathSnapshot {
            npc: EntityId(3),
            prototype: PrototypeId(9),
            spawn_point: Some(SpawnPointId(1)),
            region: RegionId(2),
            home: Position::new(1, 2, 0),
            tags,
            died_at: Timestamp(100),
        }
    }

    #[test]
    fn death_guard_is_valid_once() {
        let mut lifecycle = Lifecycle::default();
        assert!(lifecycle.begin_dying(snapshot(NpcTags::empty())).is_ok());

        let again = lifecycle.begin_dying(snapshot(NpcTags::empty()));
        assert!(matches!(again, Err(LifecycleError::AlreadyScheduled { .. })));
        assert_eq!(lifecycle.state(), LifecycleState::Dying);
    }

    #[test]
    fn creature_walks_the_full_cycle() {
        let config = LifecycleConfig::default();
        let mut lifecycle = Lifecycle::default();
        lifecycle.begin_dying(snapshot(NpcTags::empty())).unwrap();

        let despawn_at = lifecycle.enter_corpse(Timestamp(100), &config).unwrap();
        assert_eq!(despawn_at, Timestamp(100 + config.corpse_ms));
        lifecycle.despawn().unwrap();
        let respawn_at = lifecycle.after_despawn(despawn_at, &config).unwrap();
        assert_eq!(respawn_at, Some(despawn_at + config.respawn_ms));

        let death = lifecycle.complete_respawn(EntityId(42)).unwrap();
        assert_eq!(death.home, Position::new(1, 2, 0));
        assert_eq!(lifecycle.state(), LifecycleState::Replaced { by: EntityId(42) });
        assert!(lifecycle.begin_dying(snapshot(NpcTags::empty())).is_err());
    }

    #[test]
    fn resource_nodes_end_terminal() {
        let config = LifecycleConfig::default();
        let mut lifecycle = Lifecycle::default();
        lifecycle.begin_dying(snapshot(NpcTags::RESOURCE)).unwrap();
        lifecycle.enter_corpse(Timestamp(0), &config).unwrap();
        lifecycle.despawn().unwrap();

        assert_eq!(lifecycle.after_despawn(Timestamp(1), &config), Ok(None));
        assert_eq!(lifecycle.state(), LifecycleState::Terminal);
        assert_eq!(
            lifecycle.complete_respawn(EntityId(1)),
            Err(LifecycleError::ResourceRespawn)
        );
    }

    #[test]
    fn corpse_delay_by_class() {
        let config = LifecycleConfig::default();
        assert_eq!(corpse_delay_ms(NpcTags::RESOURCE, &config), config.resource_corpse_ms);
        assert_eq!(corpse_delay_ms(NpcTags::BEAST, &config), config.beast_corpse_ms);
        assert_eq!(corpse_delay_ms(NpcTags::empty(), &config), config.corpse_ms);
        assert!(config.resource_corpse_ms < config.corpse_ms);
        assert!(config.beast_corpse_ms > config.corpse_ms);
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut lifecycle = Lifecycle::default();
        assert!(matches!(
            lifecycle.despawn(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(lifecycle.is_alive());
    }
}
