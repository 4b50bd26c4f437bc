//! Call-for-help propagation.
//!
//! Assist seeds threat on nearby same-faction NPCs tagged `ASSIST` when one of
//! them is struck. Visibility is checked at propagation time: a concealed
//! attacker is never seeded onto an ally, even one standing next to the
//! victim.

use crate::config::CombatConfig;
use crate::state::{CombatWorld, EntityId, FactionId, NpcTags, Position, RegionId, Timestamp};

/// One ally drawn into a fight.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssistPull {
    pub ally: EntityId,
    pub target: EntityId,
    pub seeded: f64,
}

/// Where the call for help originates.
#[derive(Clone, Copy, Debug)]
struct Caller {
    id: EntityId,
    faction: FactionId,
    region: RegionId,
    position: Position,
}

fn caller(world: &CombatWorld, victim: EntityId) -> Option<Caller> {
    let combatant = world.get(victim)?;
    let npc = combatant.npc()?;
    Some(Caller {
        id: victim,
        faction: npc.prototype.faction,
        region: combatant.region,
        position: combatant.position,
    })
}

/// Allies of `caller` whose distance satisfies `in_range`, in id order.
fn allies_where(
    world: &CombatWorld,
    caller: &Caller,
    in_range: impl Fn(f64) -> bool,
) -> Vec<(EntityId, f64)> {
    world
        .iter()
        .filter(|c| c.id != caller.id && c.alive && c.region == caller.region)
        .filter_map(|c| {
            let npc = c.npc()?;
            let eligible = npc.tags().contains(NpcTags::ASSIST)
                && npc.prototype.faction == caller.faction
                && npc.lifecycle.is_alive();
            let distance = c.position.distance(&caller.position);
            (eligible && in_range(distance)).then_some((c.id, distance))
        })
        .collect()
}

fn attacker_visible(world: &CombatWorld, attacker: EntityId, now: Timestamp) -> bool {
    world
        .get(attacker)
        .is_some_and(|a| a.alive && !a.effects.is_concealed(now))
}

fn seed(
    world: &mut CombatWorld,
    ally: EntityId,
    attacker: EntityId,
    damage: u32,
    now: Timestamp,
    config: &CombatConfig,
) -> Option<AssistPull> {
    let npc = world.npc_mut(ally).ok()?;
    let strength = config.assist.strength.for_archetype(npc.archetype());
    let amount = f64::from(damage) * config.threat.threat_per_damage * strength;
    npc.threat.add(attacker, amount, now);
    Some(AssistPull {
        ally,
        target: attacker,
        seeded: amount,
    })
}

/// Seeds assist threat on allies within the assist radius of `victim`.
pub fn propagate_assist(
    world: &mut CombatWorld,
    victim: EntityId,
    attacker: EntityId,
    damage: u32,
    now: Timestamp,
    config: &CombatConfig,
) -> Vec<AssistPull> {
    if damage == 0 || !attacker_visible(world, attacker, now) {
        return Vec::new();
    }
    let Some(caller) = caller(world, victim) else {
        return Vec::new();
    };
    let radius = config.assist.radius;
    allies_where(world, &caller, |d| d <= radius)
        .into_iter()
        .filter_map(|(ally, _)| seed(world, ally, attacker, damage, now, config))
        .collect()
}

/// Pulls the nearest ally beyond the assist radius but within the gate pull
/// radius. Used when a gate-for-help cast completes.
pub fn pull_distant_ally(
    world: &mut CombatWorld,
    caller_id: EntityId,
    target: EntityId,
    now: Timestamp,
    config: &CombatConfig,
) -> Option<AssistPull> {
    if !attacker_visible(world, target, now) {
        return None;
    }
    let caller = caller(world, caller_id)?;
    let (inner, outer) = (config.assist.radius, config.gate.pull_radius);
    let (ally, _) = allies_where(world, &caller, |d| d > inner && d <= outer)
        .into_iter()
        .fold(None, |best: Option<(EntityId, f64)>, candidate| match best {
            Some((_, d)) if d <= candidate.1 => best,
            _ => Some(candidate),
        })?;

    // A pulled ally joins with at least the minimum threat needed to act.
    let seeded = config.threat.min_threat.max(1.0);
    let npc = world.npc_mut(ally).ok()?;
    npc.threat.add(target, seeded, now);
    Some(AssistPull {
        ally,
        target,
        seeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        Archetype, Combatant, EffectTag, NpcPrototype, PrototypeId, SpawnMeta, StatusEffect,
    };

    fn spawn(world: &mut CombatWorld, x: i32, archetype: Archetype, tags: NpcTags) -> EntityId {
        let proto = NpcPrototype::new(PrototypeId(1), "guard", 10, 100)
            .with_tags(tags)
            .with_archetype(archetype)
            .with_faction(FactionId(3));
        let meta = SpawnMeta {
            spawn_point: None,
            region: RegionId(1),
            home: Position::new(x, 0, 0),
        };
        world.spawn_npc(proto, meta, Timestamp::ZERO)
    }

    fn player(world: &mut CombatWorld) -> EntityId {
        world.insert(
            Combatant::player(EntityId::default(), "rogue", 10, 100)
                .at(RegionId(1), Position::ORIGIN),
        )
    }

    #[test]
    fn allies_in_radius_are_seeded_by_archetype() {
        let config = CombatConfig::default();
        let mut world = CombatWorld::new();
        let victim = spawn(&mut world, 0, Archetype::Normal, NpcTags::ASSIST);
        let trash = spawn(&mut world, 3, Archetype::Trash, NpcTags::ASSIST);
        let elite = spawn(&mut world, 5, Archetype::Elite, NpcTags::ASSIST);
        let attacker = player(&mut world);

        let pulls = propagate_assist(&mut world, victim, attacker, 8, Timestamp(10), &config);

        assert_eq!(pulls.len(), 2);
        assert_eq!(world.npc(trash).unwrap().threat.score(attacker), 2.0);
        assert_eq!(world.npc(elite).unwrap().threat.score(attacker), 24.0);
    }

    #[test]
    fn stealthed_attacker_is_never_seeded() {
        let config = CombatConfig::default();
        let mut world = CombatWorld::new();
        let victim = spawn(&mut world, 0, Archetype::Normal, NpcTags::ASSIST);
        let ally = spawn(&mut world, 1, Archetype::Guard, NpcTags::ASSIST);
        let attacker = player(&mut world);
        world
            .get_mut(attacker)
            .unwrap()
            .effects
            .insert(StatusEffect::new(EffectTag::Stealthed, Timestamp::ZERO, 5_000));

        let pulls = propagate_assist(&mut world, victim, attacker, 50, Timestamp(10), &config);

        assert!(pulls.is_empty());
        assert!(!world.npc(ally).unwrap().threat.contains(attacker));
    }

    #[test]
    fn untagged_far_or_foreign_npcs_stay_out() {
        let config = CombatConfig::default();
        let mut world = CombatWorld::new();
        let victim = spawn(&mut world, 0, Archetype::Normal, NpcTags::ASSIST);
        let untagged = spawn(&mut world, 2, Archetype::Normal, NpcTags::empty());
        let far = spawn(&mut world, 40, Archetype::Normal, NpcTags::ASSIST);
        let foreign = world.spawn_npc(
            NpcPrototype::new(PrototypeId(2), "wolf", 5, 50)
                .with_tags(NpcTags::ASSIST)
                .with_faction(FactionId(9)),
            SpawnMeta {
                spawn_point: None,
                region: RegionId(1),
                home: Position::new(1, 1, 0),
            },
            Timestamp::ZERO,
        );
        let attacker = player(&mut world);

        let pulls = propagate_assist(&mut world, victim, attacker, 10, Timestamp(1), &config);

        assert!(pulls.is_empty());
        for id in [untagged, far, foreign] {
            assert!(world.npc(id).unwrap().threat.is_empty());
        }
    }

    #[test]
    fn distant_pull_picks_nearest_outside_radius() {
        let config = CombatConfig::default();
        let mut world = CombatWorld::new();
        let caller = spawn(&mut world, 0, Archetype::Normal, NpcTags::GATE_CALLER);
        let _near = spawn(&mut world, 5, Archetype::Normal, NpcTags::ASSIST);
        let mid = spawn(&mut world, 30, Archetype::Normal, NpcTags::ASSIST);
        let _far = spawn(&mut world, 50, Archetype::Normal, NpcTags::ASSIST);
        let attacker = player(&mut world);

        let pull = pull_distant_ally(&mut world, caller, attacker, Timestamp(1), &config);

        assert_eq!(pull.map(|p| p.ally), Some(mid));
    }
}
