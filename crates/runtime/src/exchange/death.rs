//! Death handling for NPCs killed during an exchange.

use tracing::{debug, info, warn};

use combat_core::{CombatRole, DeathSnapshot, EntityId, LifecycleError, PrototypeId, RollSource};

use super::orchestrator::{AttackOrchestrator, ExchangeContext};
use super::report::DeathHandling;
use crate::api::{DropEntry, EntityUpdate, ItemDrop, Result, RewardGrant, StepOutcome};

impl AttackOrchestrator {
    /// Runs once per NPC death.
    ///
    /// Takes the lifecycle guard, clears the NPC's effects and gate cast,
    /// puts the corpse up, broadcasts the update and resolves rewards. A
    /// second call for the same death returns
    /// [`DeathHandling::AlreadyHandled`] without side effects. The caller
    /// schedules the returned despawn.
    pub(crate) async fn handle_death(
        &self,
        ctx: &mut ExchangeContext<'_>,
        npc: EntityId,
        killer: Option<EntityId>,
    ) -> Result<DeathHandling> {
        let now = ctx.now;
        let recipient = killer.and_then(|k| reward_recipient(ctx, k));

        let combatant = ctx.world.require_mut(npc)?;
        let (name, region, max_hp) = (combatant.name.clone(), combatant.region, combatant.max_hp);
        let Some(state) = combatant.npc_mut() else {
            return Ok(DeathHandling::NotAnNpc { combatant: npc });
        };

        let snapshot = DeathSnapshot {
            npc,
            prototype: state.prototype.id,
            spawn_point: state.spawn.spawn_point,
            region: state.spawn.region,
            home: state.spawn.home,
            tags: state.tags(),
            died_at: now,
        };
        if let Err(err) = state.lifecycle.begin_dying(snapshot) {
            match err {
                LifecycleError::AlreadyScheduled { state } => {
                    debug!(%npc, %state, "death already handled")
                }
                other => warn!(%npc, err = %other, "unexpected lifecycle state on death"),
            }
            return Ok(DeathHandling::AlreadyHandled { npc });
        }

        state.gate.cancel();
        let despawn_at = state.lifecycle.enter_corpse(now, &self.config().lifecycle)?;
        combatant.effects.clear();
        combatant.engaged_target = None;
        combatant.in_combat_until = None;

        info!(%npc, %name, %despawn_at, "npc died");
        self.collaborators().room.entity_update(
            region,
            EntityUpdate {
                id: npc,
                hp: 0,
                max_hp,
                alive: false,
            },
        );

        let rewards = match recipient {
            Some(recipient) => self.grant_rewards(ctx, npc, snapshot.prototype, recipient).await,
            None => StepOutcome::Done(None),
        };

        Ok(DeathHandling::Scheduled {
            npc,
            despawn_at,
            rewards,
        })
    }

    async fn grant_rewards(
        &self,
        ctx: &mut ExchangeContext<'_>,
        npc: EntityId,
        prototype: PrototypeId,
        recipient: EntityId,
    ) -> StepOutcome<Option<RewardGrant>> {
        let rewards = &self.collaborators().rewards;
        let table = match rewards.rewards_for(prototype).await {
            Ok(table) => table,
            Err(err) => {
                warn!(%err, %npc, %prototype, "reward lookup failed");
                return StepOutcome::degraded(err);
            }
        };

        let grant = RewardGrant {
            recipient,
            npc,
            prototype,
            xp: table.xp,
            items: roll_drops(&table.drops, &mut *ctx.rolls),
        };
        match rewards.grant(&grant).await {
            Ok(()) => {
                debug!(%npc, %recipient, xp = grant.xp, items = grant.items.len(), "rewards granted");
                StepOutcome::Done(Some(grant))
            }
            Err(err) => {
                warn!(%err, %npc, %recipient, "reward grant failed");
                StepOutcome::degraded(err)
            }
        }
    }
}

/// Players collect their own kills; pets collect for their owner.
fn reward_recipient(ctx: &ExchangeContext<'_>, killer: EntityId) -> Option<EntityId> {
    match &ctx.world.get(killer)?.role {
        CombatRole::Player => Some(killer),
        CombatRole::Pet { owner } => Some(*owner),
        CombatRole::Npc(_) => None,
    }
}

/// Rolls every table entry: one draw against `drop_chance`, then a quantity
/// draw in `[min_qty, max_qty]` for entries that drop.
pub fn roll_drops<R>(drops: &[DropEntry], rolls: &mut R) -> Vec<ItemDrop>
where
    R: RollSource + ?Sized,
{
    drops
        .iter()
        .filter_map(|entry| {
            let chance = if entry.drop_chance.is_finite() {
                entry.drop_chance.clamp(0.0, 1.0)
            } else {
                0.0
            };
            if rolls.next_roll() >= chance {
                return None;
            }
            let quantity = rolls.range(entry.min_qty, entry.max_qty.max(entry.min_qty));
            (quantity > 0).then(|| ItemDrop {
                item_id: entry.item_id.clone(),
                quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use combat_core::SequenceRolls;

    use super::*;

    fn entry(item: &str, chance: f64, min: u32, max: u32) -> DropEntry {
        DropEntry {
            item_id: item.to_string(),
            drop_chance: chance,
            min_qty: min,
            max_qty: max,
        }
    }

    #[test]
    fn drops_roll_chance_then_quantity() {
        let table = [entry("pelt", 0.5, 1, 3), entry("fang", 0.1, 1, 1)];
        // pelt drops (0.2 < 0.5) with qty draw 0.99 -> 3; fang misses (0.4 >= 0.1)
        let mut rolls = SequenceRolls::new(vec![0.2, 0.99, 0.4]);

        let items = roll_drops(&table, &mut rolls);

        assert_eq!(
            items,
            vec![ItemDrop {
                item_id: "pelt".to_string(),
                quantity: 3
            }]
        );
        assert_eq!(rolls.consumed(), 3);
    }

    #[test]
    fn zero_quantity_and_broken_chances_drop_nothing() {
        let table = [entry("dust", 1.0, 0, 0), entry("void", f64::NAN, 1, 1)];
        let mut rolls = SequenceRolls::new(vec![0.0]);
        assert!(roll_drops(&table, &mut rolls).is_empty());
    }
}
