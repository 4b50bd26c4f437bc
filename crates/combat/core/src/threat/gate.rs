//! "Gate for help": a multi-second cast that summons a distant ally.
//!
//! ```text
//! Idle ──begin──▶ Casting ──poll(now ≥ completes_at)──▶ Idle (cooldown)
//!                   │  ▲
//!        damage ────┘  └── completes_at += min(pushback, cap)
//!                   │
//!        burst ─────┴──▶ Idle (cooldown, interrupted)
//! ```

use crate::config::{CombatConfig, GateConfig};
use crate::state::{CombatWorld, EntityId, Timestamp};
use crate::threat::{AssistPull, pull_distant_ally};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GatePhase {
    #[default]
    Idle,
    Casting {
        target: EntityId,
        started_at: Timestamp,
        /// Accumulated pushback, never above `max_pushback_ms`.
        pushback_ms: u64,
    },
}

/// Gate cast state of one NPC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateCast {
    phase: GatePhase,
    cooldown_until: Option<Timestamp>,
}

/// What a damage event did to an in-progress cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GateDamage {
    NotCasting,
    PushedBack { completes_at: Timestamp },
    Interrupted,
}

impl GateCast {
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn is_casting(&self) -> bool {
        matches!(self.phase, GatePhase::Casting { .. })
    }

    pub fn on_cooldown(&self, now: Timestamp) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub fn can_begin(&self, now: Timestamp) -> bool {
        !self.is_casting() && !self.on_cooldown(now)
    }

    pub fn completes_at(&self, config: &GateConfig) -> Option<Timestamp> {
        match self.phase {
            GatePhase::Casting {
                started_at,
                pushback_ms,
                ..
            } => Some(started_at.plus_ms(config.cast_ms).plus_ms(pushback_ms)),
            GatePhase::Idle => None,
        }
    }

    /// Starts casting against `target`. Returns the completion time, or
    /// `None` if already casting or on cooldown.
    pub fn begin(&mut self, target: EntityId, now: Timestamp, config: &GateConfig) -> Option<Timestamp> {
        if !self.can_begin(now) {
            return None;
        }
        self.phase = GatePhase::Casting {
            target,
            started_at: now,
            pushback_ms: 0,
        };
        self.completes_at(config)
    }

    /// Pushes completion back by `damage × pushback_per_damage_ms`, capped in
    /// total. A single hit of at least `interrupt_burst_pct × max_hp`
    /// interrupts the cast when interrupts are configured.
    pub fn on_damage(&mut self, damage: u32, max_hp: u32, now: Timestamp, config: &GateConfig) -> GateDamage {
        let GatePhase::Casting {
            target,
            started_at,
            pushback_ms,
        } = self.phase
        else {
            return GateDamage::NotCasting;
        };

        if let Some(pct) = config.interrupt_burst_pct
            && pct.is_finite()
            && max_hp > 0
            && f64::from(damage) >= pct * f64::from(max_hp)
        {
            self.phase = GatePhase::Idle;
            self.cooldown_until = Some(now.plus_ms(config.cooldown_ms));
            return GateDamage::Interrupted;
        }

        let added = u64::from(damage).saturating_mul(config.pushback_per_damage_ms);
        let pushback_ms = pushback_ms.saturating_add(added).min(config.max_pushback_ms);
        self.phase = GatePhase::Casting {
            target,
            started_at,
            pushback_ms,
        };
        GateDamage::PushedBack {
            completes_at: started_at.plus_ms(config.cast_ms).plus_ms(pushback_ms),
        }
    }

    /// Completes the cast if due, entering cooldown. Returns the cast target.
    pub fn poll(&mut self, now: Timestamp, config: &GateConfig) -> Option<EntityId> {
        let completes_at = self.completes_at(config)?;
        if now < completes_at {
            return None;
        }
        let GatePhase::Casting { target, .. } = self.phase else {
            return None;
        };
        self.phase = GatePhase::Idle;
        self.cooldown_until = Some(now.plus_ms(config.cooldown_ms));
        Some(target)
    }

    /// Drops an in-progress cast without cooldown (death, despawn).
    pub fn cancel(&mut self) {
        self.phase = GatePhase::Idle;
    }
}

/// Polls the gate cast of `caster`; on completion pulls one distant ally
/// onto the cast target.
pub fn poll_gate(
    world: &mut CombatWorld,
    caster: EntityId,
    now: Timestamp,
    config: &CombatConfig,
) -> Option<AssistPull> {
    let target = {
        let combatant = world.get_mut(caster)?;
        if !combatant.alive {
            return None;
        }
        combatant.npc_mut()?.gate.poll(now, &config.gate)?
    };
    pull_distant_ally(world, caster, target, now, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        Combatant, FactionId, NpcPrototype, NpcTags, Position, PrototypeId, RegionId, SpawnMeta,
    };

    fn npc(world: &mut CombatWorld, x: i32, tags: NpcTags) -> EntityId {
        world.spawn_npc(
            NpcPrototype::new(PrototypeId(4), "kobold", 8, 80)
                .with_tags(tags)
                .with_faction(FactionId(2)),
            SpawnMeta {
                spawn_point: None,
                region: RegionId(1),
                home: Position::new(x, 0, 0),
            },
            Timestamp::ZERO,
        )
    }

    #[test]
    fn pushback_delays_completion_and_pull() {
        let config = CombatConfig::default();
        let mut world = CombatWorld::new();
        let caster = npc(&mut world, 0, NpcTags::GATE_CALLER);
        let ally = npc(&mut world, 30, NpcTags::ASSIST);
        let attacker = world.insert(
            Combatant::player(EntityId::default(), "p", 8, 100).at(RegionId(1), Position::ORIGIN),
        );
        let t0 = Timestamp(5_000);

        let gate = &mut world.npc_mut(caster).unwrap().gate;
        assert_eq!(gate.begin(attacker, t0, &config.gate), Some(t0 + 8_000));
        assert_eq!(
            gate.on_damage(5, 80, t0 + 1_000, &config.gate),
            GateDamage::PushedBack {
                completes_at: t0 + 9_000
            }
        );

        assert_eq!(poll_gate(&mut world, caster, t0 + 8_000, &config), None);
        assert!(world.npc(ally).unwrap().threat.is_empty());

        let pulled = poll_gate(&mut world, caster, t0 + 9_000, &config);
        assert_eq!(pulled.map(|p| p.ally), Some(ally));
        assert!(world.npc(ally).unwrap().threat.contains(attacker));
        assert!(!world.npc(caster).unwrap().gate.is_casting());
    }

    #[test]
    fn pushback_is_capped() {
        let config = GateConfig::default();
        let mut gate = GateCast::default();
        gate.begin(EntityId(1), Timestamp(0), &config);

        gate.on_damage(500, 10_000, Timestamp(100), &config);
        gate.on_damage(500, 10_000, Timestamp(200), &config);

        let cap = config.cast_ms + config.max_pushback_ms;
        assert_eq!(gate.completes_at(&config), Some(Timestamp(cap)));
    }

    #[test]
    fn burst_interrupts_when_configured() {
        let config = GateConfig {
            interrupt_burst_pct: Some(0.25),
            ..GateConfig::default()
        };
        let mut gate = GateCast::default();
        gate.begin(EntityId(1), Timestamp(0), &config);

        assert!(matches!(
            gate.on_damage(19, 80, Timestamp(10), &config),
            GateDamage::PushedBack { .. }
        ));
        assert_eq!(gate.on_damage(20, 80, Timestamp(20), &config), GateDamage::Interrupted);
        assert!(!gate.is_casting());
        assert!(gate.on_cooldown(Timestamp(20)));
    }

    #[test]
    fn cooldown_blocks_recast() {
        let config = GateConfig::default();
        let mut gate = GateCast::default();
        gate.begin(EntityId(1), Timestamp(0), &config);
        assert_eq!(gate.poll(Timestamp(config.cast_ms), &config), Some(EntityId(1)));

        let done = Timestamp(config.cast_ms);
        assert_eq!(gate.begin(EntityId(1), done + 1, &config), None);
        assert!(gate.begin(EntityId(1), done + config.cooldown_ms, &config).is_some());
    }
}
