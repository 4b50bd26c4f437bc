//! Per-exchange state machine.
//!
//! [`AttackOrchestrator::execute`] runs one exchange in a fixed order:
//!
//! 1. zone policy
//! 2. protection
//! 3. physical hit resolution (skipped for spell channels) and damage engine
//! 4. damage application, threat and assist, death handling
//! 5. attacker progression
//! 6. narration
//! 7. counter-swing
//!
//! Steps 1 and 2 short-circuit with a player-facing reason. Collaborator
//! failures after damage is applied are logged and recorded as
//! [`StepOutcome::Degraded`]; they never undo the swing.

use std::sync::Arc;

use tracing::{debug, warn};

use combat_core::{
    AbilityMeta, AssistPull, AttackerContext, CombatConfig, CombatError, CombatWorld, Combatant,
    DamageChannel, DamageReport, EntityId, GateDamage, NpcTags, ProgressionGain, RollSource,
    ShardId, SwingCapabilities, SwingFacts, SwingInput, SwingOutcome, Timestamp, ZoneRef,
    apply_block, apply_damage, narrate_swing, progression_for, propagate_assist, resolve_swing,
};

use super::report::{AttackRequest, ExchangeOutcome, ExchangeReport, HitReport, SwingSummary};
use crate::api::{
    CollaboratorError, Collaborators, DamageOptions, DamageRoll, DamageSource, DamageTarget,
    PolicySubject, Result, StepOutcome,
};

/// Shown when the zone policy denies without a reason or fails outright.
pub const DEFAULT_DENIAL: &str = "You cannot fight here.";

/// Mutable state borrowed for the duration of one exchange.
pub struct ExchangeContext<'a> {
    pub world: &'a mut CombatWorld,
    pub rolls: &'a mut dyn RollSource,
    pub now: Timestamp,
}

/// Sequences exchanges against the injected collaborators.
#[derive(Clone)]
pub struct AttackOrchestrator {
    config: Arc<CombatConfig>,
    collaborators: Collaborators,
    shard: ShardId,
}

impl AttackOrchestrator {
    pub fn new(config: Arc<CombatConfig>, collaborators: Collaborators, shard: ShardId) -> Self {
        Self {
            config,
            collaborators,
            shard,
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Runs one full exchange.
    ///
    /// Missing or dead participants reject the exchange with an error before
    /// anything is rolled.
    pub async fn execute(
        &self,
        ctx: &mut ExchangeContext<'_>,
        request: AttackRequest,
    ) -> Result<ExchangeReport> {
        let AttackRequest {
            attacker,
            target,
            ability,
            capabilities,
        } = request;

        if attacker == target {
            return Err(CombatError::SelfTarget(attacker).into());
        }
        let (attacker_subject, target_subject, attacker_is_npc, protected_name) = {
            let a = ctx.world.require(attacker)?;
            let t = ctx.world.require(target)?;
            if !a.alive {
                return Err(CombatError::AlreadyDead(attacker).into());
            }
            if !t.alive {
                return Err(CombatError::AlreadyDead(target).into());
            }
            (
                policy_subject(a),
                policy_subject(t),
                a.is_npc(),
                t.protected.then(|| t.name.clone()),
            )
        };

        // 1. zone policy, player-initiated exchanges only
        if !attacker_is_npc
            && let Some(reason) = self.zone_denial(&attacker_subject, &target_subject).await
        {
            debug!(%attacker, %target, %reason, "exchange denied by zone policy");
            return Ok(ExchangeReport {
                attacker,
                target,
                outcome: ExchangeOutcome::Denied { reason },
            });
        }

        // 2. protection
        if let Some(name) = protected_name {
            debug!(%attacker, %target, "exchange denied: target is protected");
            return Ok(ExchangeReport {
                attacker,
                target,
                outcome: ExchangeOutcome::Denied {
                    reason: format!("{name} cannot be harmed."),
                },
            });
        }

        // 3-4, 6
        let swing = self
            .swing(ctx, attacker, target, ability.as_ref(), capabilities)
            .await?;

        // 5
        let progression = if attacker_is_npc {
            None
        } else {
            self.progress(ctx, attacker, swing.damage()).await
        };

        // 7
        let counter = if self.counter_due(ctx, &swing) {
            let counter = self
                .swing(ctx, target, attacker, None, SwingCapabilities::default())
                .await?;
            Some(Box::new(counter))
        } else {
            None
        };

        debug!(
            %attacker,
            %target,
            outcome = ?swing.resolution.map(|r| r.outcome),
            damage = swing.damage(),
            countered = counter.is_some(),
            "exchange resolved"
        );

        Ok(ExchangeReport {
            attacker,
            target,
            outcome: ExchangeOutcome::Resolved {
                swing: Box::new(swing),
                progression,
                counter,
            },
        })
    }

    async fn zone_denial(&self, attacker: &PolicySubject, target: &PolicySubject) -> Option<String> {
        let zone = ZoneRef {
            shard: self.shard,
            region: target.region,
        };
        match self.collaborators.zone.can_damage(attacker, target, zone).await {
            Ok(decision) if decision.allowed => None,
            Ok(decision) => Some(
                decision
                    .reason
                    .unwrap_or_else(|| DEFAULT_DENIAL.to_string()),
            ),
            Err(err) => {
                warn!(%err, attacker = %attacker.id, target = %target.id, "zone policy failed, denying");
                Some(DEFAULT_DENIAL.to_string())
            }
        }
    }

    /// One swing from `attacker` onto `defender`, including damage
    /// application. Used for both the main swing and the counter.
    async fn swing(
        &self,
        ctx: &mut ExchangeContext<'_>,
        attacker: EntityId,
        defender: EntityId,
        ability: Option<&AbilityMeta>,
        capabilities: SwingCapabilities,
    ) -> Result<SwingSummary> {
        let (source, target, input) = {
            let a = ctx.world.require(attacker)?;
            let d = ctx.world.require(defender)?;
            let input = SwingInput::new(a.level, d.level, a.weapon_skill)
                .with_defense_skill(d.defense_skill)
                .with_capabilities(capabilities);
            (damage_source(a, ability), damage_target(d), input)
        };

        let channel = ability.map_or(DamageChannel::Physical, |a| a.channel);
        let resolution = (!channel.is_spell()).then(|| resolve_swing(&input, &mut *ctx.rolls));
        let outcome = resolution.map_or(SwingOutcome::Hit, |r| r.outcome);
        let ability_name = ability.map(|a| a.name.as_str());

        if !outcome.connects() {
            engage(ctx, attacker, defender, self.config.combat.combat_tag_ms);
            let narration = narrate_swing(&SwingFacts {
                attacker: &source.name,
                defender: &target.name,
                ability: ability_name,
                outcome,
                damage: 0,
                strikes: 1,
                crit: false,
                glancing: false,
                overkill: 0,
                killed: false,
            });
            return Ok(SwingSummary {
                attacker,
                defender,
                resolution,
                roll: None,
                hit: None,
                narration,
            });
        }

        let strikes = resolution.map_or(1, |r| r.strikes.max(1));
        let options = DamageOptions {
            damage_multiplier: ability.map(|a| a.multiplier),
            flat_bonus: ability.map(|a| a.flat_bonus),
            crit_chance: resolution.map(|r| r.crit_chance),
            glancing_chance: resolution.map(|r| r.glancing_chance),
            apply_defender_damage_taken_mods: false,
        };
        let (rolled, roll) = match self.roll_damage(&source, &target, &options, strikes).await {
            Ok(rolled) => (rolled, StepOutcome::Done(rolled)),
            Err(err) => {
                let fallback = source.base_damage.unwrap_or(1).saturating_mul(u32::from(strikes));
                warn!(%err, %attacker, %defender, fallback, "damage engine failed, using base damage");
                let rolled = DamageRoll {
                    damage: fallback,
                    was_crit: false,
                    was_glancing: false,
                };
                (rolled, StepOutcome::degraded(err))
            }
        };

        let raw = match resolution {
            Some(r) if r.outcome == SwingOutcome::Block => apply_block(rolled.damage, r.block_multiplier),
            _ => rolled.damage,
        };
        let context = AttackerContext {
            id: Some(attacker),
            level: source.level,
            weapon_skill: source.weapon_skill,
            ability: ability.cloned(),
        };
        let hit = self.apply_hit(ctx, defender, raw, Some(&context)).await?;

        let narration = narrate_swing(&SwingFacts {
            attacker: &source.name,
            defender: &target.name,
            ability: ability_name,
            outcome,
            damage: hit.damage.amount,
            strikes,
            crit: rolled.was_crit,
            glancing: rolled.was_glancing,
            overkill: hit.damage.overkill,
            killed: hit.damage.killed,
        });

        Ok(SwingSummary {
            attacker,
            defender,
            resolution,
            roll: Some(roll),
            hit: Some(hit),
            narration,
        })
    }

    /// Asks the damage engine once per strike and sums the results.
    async fn roll_damage(
        &self,
        source: &DamageSource,
        target: &DamageTarget,
        options: &DamageOptions,
        strikes: u8,
    ) -> std::result::Result<DamageRoll, CollaboratorError> {
        let mut total = DamageRoll::default();
        for _ in 0..strikes {
            let roll = self
                .collaborators
                .damage
                .compute_damage(source, target, options)
                .await?;
            total.damage = total.damage.saturating_add(roll.damage);
            total.was_crit |= roll.was_crit;
            total.was_glancing |= roll.was_glancing;
        }
        Ok(total)
    }

    /// Low-level damage applier.
    ///
    /// Applies `raw` through the mitigation pipeline, then records threat,
    /// assist and gate pushback, then runs death handling on a lethal hit.
    /// Hitting a corpse reaches death handling again, where the lifecycle
    /// guard turns it into [`super::DeathHandling::AlreadyHandled`].
    pub async fn apply_hit(
        &self,
        ctx: &mut ExchangeContext<'_>,
        target: EntityId,
        raw: u32,
        attacker: Option<&AttackerContext>,
    ) -> Result<HitReport> {
        let source = attacker.and_then(|a| a.id);
        let was_alive = {
            let defender = ctx.world.require(target)?;
            if let Some(source) = source
                && !self.collaborators.zone.can_damage_fast(source, target)
            {
                debug!(%source, %target, "hit refused by policy backstop");
                return Ok(HitReport {
                    target,
                    damage: DamageReport {
                        amount: 0,
                        overkill: 0,
                        new_hp: defender.hp,
                        max_hp: defender.max_hp,
                        killed: false,
                    },
                    refused: true,
                    assists: Vec::new(),
                    gate: None,
                    death: None,
                });
            }
            defender.alive
        };

        let damage = apply_damage(ctx.world, target, raw, attacker, ctx.now, &self.config)?;

        let (assists, gate) = match source {
            Some(source) if was_alive && damage.amount > 0 => {
                self.record_threat(ctx, target, source, &damage)
            }
            _ => (Vec::new(), None),
        };

        let death = if damage.killed {
            Some(self.handle_death(ctx, target, source).await?)
        } else {
            None
        };

        Ok(HitReport {
            target,
            damage,
            refused: false,
            assists,
            gate,
            death,
        })
    }

    /// Threat on the struck NPC, gate cast start or pushback, and the call
    /// for help to its allies.
    fn record_threat(
        &self,
        ctx: &mut ExchangeContext<'_>,
        victim: EntityId,
        attacker: EntityId,
        damage: &DamageReport,
    ) -> (Vec<AssistPull>, Option<GateDamage>) {
        let now = ctx.now;
        let config = &self.config;
        let Some(combatant) = ctx.world.get_mut(victim) else {
            return (Vec::new(), None);
        };
        let max_hp = combatant.max_hp;
        let Some(npc) = combatant.npc_mut() else {
            return (Vec::new(), None);
        };

        npc.threat
            .add_damage(attacker, damage.amount, now, &config.threat);

        let mut gate = None;
        if !damage.killed && npc.tags().contains(NpcTags::GATE_CALLER) {
            if npc.gate.is_casting() {
                let result = npc.gate.on_damage(damage.amount, max_hp, now, &config.gate);
                debug!(npc = %victim, ?result, "gate cast struck");
                gate = Some(result);
            } else if let Some(completes_at) = npc.gate.begin(attacker, now, &config.gate) {
                debug!(npc = %victim, %completes_at, "gate cast started");
            }
        }

        let assists = propagate_assist(ctx.world, victim, attacker, damage.amount, now, config);
        if !assists.is_empty() {
            debug!(npc = %victim, pulled = assists.len(), "allies answered the call for help");
        }
        (assists, gate)
    }

    async fn progress(
        &self,
        ctx: &mut ExchangeContext<'_>,
        attacker: EntityId,
        damage: u32,
    ) -> Option<StepOutcome<ProgressionGain>> {
        let combatant = ctx.world.get_mut(attacker)?;
        let gain = progression_for(combatant.level, combatant.weapon_skill, damage);
        combatant.weapon_skill = combatant.weapon_skill.saturating_add(gain.weapon_skill);
        if gain.is_empty() {
            return Some(StepOutcome::Done(gain));
        }

        match self.collaborators.progression.record(attacker, gain).await {
            Ok(()) => Some(StepOutcome::Done(gain)),
            Err(err) => {
                warn!(%err, %attacker, "progression sink failed");
                Some(StepOutcome::degraded(err))
            }
        }
    }

    /// Whether the defender of `swing` swings back now.
    ///
    /// A parry grants a free riposte regardless of cadence; otherwise the
    /// NPC's auto-attack interval must have elapsed.
    fn counter_due(&self, ctx: &mut ExchangeContext<'_>, swing: &SwingSummary) -> bool {
        let now = ctx.now;
        let attacker_alive = ctx
            .world
            .get(swing.attacker)
            .is_some_and(|a| a.alive);
        let riposte = self.config.combat.riposte_on_parry
            && swing.resolution.is_some_and(|r| r.riposte);
        let interval = self.config.combat.auto_attack_interval_ms;

        let Some(defender) = ctx.world.get_mut(swing.defender) else {
            return false;
        };
        if !defender.alive || !attacker_alive {
            return false;
        }
        let Some(npc) = defender.npc_mut() else {
            return false;
        };
        if !npc.can_counter() {
            return false;
        }
        if riposte {
            return true;
        }
        let ready = npc
            .last_swing_at
            .is_none_or(|last| now.since(last) >= interval);
        if ready {
            npc.last_swing_at = Some(now);
        }
        ready
    }
}

/// Tags both sides of a swing that did not connect.
fn engage(ctx: &mut ExchangeContext<'_>, attacker: EntityId, defender: EntityId, tag_ms: u64) {
    if let Some(a) = ctx.world.get_mut(attacker) {
        a.tag_combat(ctx.now, tag_ms);
        a.engaged_target = Some(defender);
    }
    if let Some(d) = ctx.world.get_mut(defender) {
        d.tag_combat(ctx.now, tag_ms);
    }
}

fn policy_subject(combatant: &Combatant) -> PolicySubject {
    PolicySubject {
        id: combatant.id,
        level: combatant.level,
        is_npc: combatant.is_npc(),
        region: combatant.region,
    }
}

fn damage_source(combatant: &Combatant, ability: Option<&AbilityMeta>) -> DamageSource {
    DamageSource {
        id: combatant.id,
        name: combatant.name.clone(),
        level: combatant.level,
        weapon_skill: combatant.weapon_skill,
        base_damage: combatant.npc().map(|npc| npc.prototype.base_damage),
        ability: ability.cloned(),
    }
}

fn damage_target(combatant: &Combatant) -> DamageTarget {
    DamageTarget {
        id: combatant.id,
        name: combatant.name.clone(),
        level: combatant.level,
        hp: combatant.hp,
        max_hp: combatant.max_hp,
    }
}
