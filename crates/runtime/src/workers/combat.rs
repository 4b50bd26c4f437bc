//! Combat worker that owns the authoritative [`CombatWorld`] of one shard.
//!
//! Receives commands from [`crate::api::CombatHandle`] and from lifecycle
//! timers, runs exchanges through the [`AttackOrchestrator`], and publishes
//! results to the EventBus.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use combat_content::PrototypeCatalog;
use combat_core::{
    AttackerContext, CombatError, CombatWorld, Combatant, EntityId, LifecycleState, Position,
    RollSource, SpawnMeta, StatusEffect, poll_gate,
};

use crate::api::{
    AssistTarget, Collaborators, EntitySpawn, NpcSpawn, Result, RuntimeError, TickReport,
};
use crate::events::{CombatEvent, Event, EventBus};
use crate::exchange::{
    AttackOrchestrator, AttackRequest, DeathHandling, ExchangeContext, ExchangeReport, HitReport,
};
use crate::scheduler::{LifecycleScheduler, LifecycleStage, PendingTimer, RuntimeClock};

/// Commands that can be sent to the combat worker
pub enum Command {
    SpawnPlayer {
        combatant: Combatant,
        reply: oneshot::Sender<EntityId>,
    },
    SpawnNpc {
        spawn: NpcSpawn,
        reply: oneshot::Sender<Result<EntityId>>,
    },
    Attack {
        request: AttackRequest,
        reply: oneshot::Sender<Result<ExchangeReport>>,
    },
    ApplyDamage {
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
        reply: oneshot::Sender<Result<HitReport>>,
    },
    Taunt {
        npc: EntityId,
        taunter: EntityId,
        duration_ms: u64,
        reply: oneshot::Sender<Result<()>>,
    },
    Flee {
        combatant: EntityId,
        reply: oneshot::Sender<Result<u8>>,
    },
    ApplyEffect {
        target: EntityId,
        effect: StatusEffect,
        duration_ms: u64,
        reply: oneshot::Sender<Result<u64>>,
    },
    Tick {
        reply: oneshot::Sender<TickReport>,
    },
    QueryCombatant {
        id: EntityId,
        reply: oneshot::Sender<Option<Combatant>>,
    },
    Remove {
        id: EntityId,
        reply: oneshot::Sender<Option<Combatant>>,
    },
    LifecycleState {
        npc: EntityId,
        reply: oneshot::Sender<Option<LifecycleState>>,
    },
    PendingLifecycle {
        npc: EntityId,
        reply: oneshot::Sender<Option<PendingTimer>>,
    },
    CancelLifecycle {
        npc: EntityId,
        reply: oneshot::Sender<bool>,
    },
    PendingLifecycleCount {
        reply: oneshot::Sender<usize>,
    },
    /// Sent by the lifecycle scheduler when a timer fires.
    LifecycleTimer { npc: EntityId, ticket: u64 },
    Shutdown,
}

/// Background task that processes combat commands.
pub struct CombatWorker {
    world: CombatWorld,
    rolls: Box<dyn RollSource>,
    orchestrator: AttackOrchestrator,
    catalog: PrototypeCatalog,
    scheduler: LifecycleScheduler,
    /// Despawned NPCs waiting for their respawn timer.
    graveyard: BTreeMap<EntityId, Combatant>,
    clock: RuntimeClock,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
}

impl CombatWorker {
    pub fn new(
        orchestrator: AttackOrchestrator,
        rolls: Box<dyn RollSource>,
        catalog: PrototypeCatalog,
        scheduler: LifecycleScheduler,
        clock: RuntimeClock,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
    ) -> Self {
        info!("CombatWorker initialized with {} prototypes", catalog.len());

        Self {
            world: CombatWorld::new(),
            rolls,
            orchestrator,
            catalog,
            scheduler,
            graveyard: BTreeMap::new(),
            clock,
            command_rx,
            event_bus,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            if matches!(cmd, Command::Shutdown) {
                debug!("CombatWorker shutting down");
                break;
            }
            self.handle_command(cmd).await;
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SpawnPlayer { combatant, reply } => {
                let id = self.world.insert(combatant);
                debug!(%id, "combatant spawned");
                if reply.send(id).is_err() {
                    debug!("SpawnPlayer reply channel closed (caller dropped)");
                }
            }
            Command::SpawnNpc { spawn, reply } => {
                let result = self.spawn_npc(spawn);
                if reply.send(result).is_err() {
                    debug!("SpawnNpc reply channel closed (caller dropped)");
                }
            }
            Command::Attack { request, reply } => {
                let result = self.attack(request).await;
                if reply.send(result).is_err() {
                    debug!("Attack reply channel closed (caller dropped)");
                }
            }
            Command::ApplyDamage {
                target,
                amount,
                source,
                reply,
            } => {
                let result = self.apply_damage(target, amount, source).await;
                if reply.send(result).is_err() {
                    debug!("ApplyDamage reply channel closed (caller dropped)");
                }
            }
            Command::Taunt {
                npc,
                taunter,
                duration_ms,
                reply,
            } => {
                let result = self.taunt(npc, taunter, duration_ms);
                if reply.send(result).is_err() {
                    debug!("Taunt reply channel closed (caller dropped)");
                }
            }
            Command::Flee { combatant, reply } => {
                let result = self.flee(combatant);
                if reply.send(result).is_err() {
                    debug!("Flee reply channel closed (caller dropped)");
                }
            }
            Command::ApplyEffect {
                target,
                effect,
                duration_ms,
                reply,
            } => {
                let result = self.apply_effect(target, effect, duration_ms);
                if reply.send(result).is_err() {
                    debug!("ApplyEffect reply channel closed (caller dropped)");
                }
            }
            Command::Tick { reply } => {
                let report = self.tick();
                if reply.send(report).is_err() {
                    debug!("Tick reply channel closed (caller dropped)");
                }
            }
            Command::QueryCombatant { id, reply } => {
                if reply.send(self.world.get(id).cloned()).is_err() {
                    debug!("QueryCombatant reply channel closed (caller dropped)");
                }
            }
            Command::Remove { id, reply } => {
                let removed = self
                    .world
                    .remove(id)
                    .or_else(|| self.graveyard.remove(&id));
                let cancelled = self.scheduler.cancel(id);
                debug!(%id, removed = removed.is_some(), cancelled, "combatant removed");
                if reply.send(removed).is_err() {
                    debug!("Remove reply channel closed (caller dropped)");
                }
            }
            Command::LifecycleState { npc, reply } => {
                if reply.send(self.lifecycle_state(npc)).is_err() {
                    debug!("LifecycleState reply channel closed (caller dropped)");
                }
            }
            Command::PendingLifecycle { npc, reply } => {
                if reply.send(self.scheduler.pending(npc)).is_err() {
                    debug!("PendingLifecycle reply channel closed (caller dropped)");
                }
            }
            Command::CancelLifecycle { npc, reply } => {
                let cancelled = self.cancel_lifecycle(npc);
                if reply.send(cancelled).is_err() {
                    debug!("CancelLifecycle reply channel closed (caller dropped)");
                }
            }
            Command::PendingLifecycleCount { reply } => {
                if reply.send(self.scheduler.len()).is_err() {
                    debug!("PendingLifecycleCount reply channel closed (caller dropped)");
                }
            }
            Command::LifecycleTimer { npc, ticket } => self.on_lifecycle_timer(npc, ticket),
            Command::Shutdown => {}
        }
    }

    fn collaborators(&self) -> &Collaborators {
        self.orchestrator.collaborators()
    }

    fn spawn_npc(&mut self, spawn: NpcSpawn) -> Result<EntityId> {
        let prototype = self
            .catalog
            .get(spawn.prototype)
            .cloned()
            .ok_or(RuntimeError::UnknownPrototype(spawn.prototype))?;
        let home = match spawn.spawn_point {
            Some(point) => self
                .collaborators()
                .spawn_points
                .spawn_point(point)
                .ok_or(RuntimeError::UnknownSpawnPoint(point))?,
            None => spawn.position.unwrap_or(Position::ORIGIN),
        };

        let meta = SpawnMeta {
            spawn_point: spawn.spawn_point,
            region: spawn.region,
            home,
        };
        let id = self.world.spawn_npc(prototype, meta, self.clock.now());
        if let Some(owner) = spawn.owner {
            self.world.npc_mut(id)?.owner = Some(owner);
        }
        debug!(%id, prototype = %spawn.prototype, region = %spawn.region, "npc spawned");
        Ok(id)
    }

    async fn attack(&mut self, request: AttackRequest) -> Result<ExchangeReport> {
        let mut ctx = ExchangeContext {
            world: &mut self.world,
            rolls: self.rolls.as_mut(),
            now: self.clock.now(),
        };
        let report = self.orchestrator.execute(&mut ctx, request).await?;

        for death in report.deaths() {
            self.schedule_despawn(death);
        }
        self.event_bus
            .publish(Event::Combat(CombatEvent::ExchangeResolved {
                attacker: report.attacker,
                target: report.target,
                lines: report.lines(),
                killed: report.killed(),
            }));
        Ok(report)
    }

    async fn apply_damage(
        &mut self,
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
    ) -> Result<HitReport> {
        let attacker = match source {
            Some(id) => {
                let source = self.world.require(id)?;
                Some(AttackerContext {
                    id: Some(id),
                    level: source.level,
                    weapon_skill: source.weapon_skill,
                    ability: None,
                })
            }
            None => None,
        };

        let mut ctx = ExchangeContext {
            world: &mut self.world,
            rolls: self.rolls.as_mut(),
            now: self.clock.now(),
        };
        let hit = self
            .orchestrator
            .apply_hit(&mut ctx, target, amount, attacker.as_ref())
            .await?;

        if let Some(death) = &hit.death {
            self.schedule_despawn(death);
        }
        Ok(hit)
    }

    fn schedule_despawn(&mut self, death: &DeathHandling) {
        match death {
            DeathHandling::Scheduled {
                npc, despawn_at, ..
            } => {
                self.scheduler
                    .schedule(*npc, LifecycleStage::Despawn, *despawn_at);
            }
            DeathHandling::AlreadyHandled { npc } => {
                trace!(%npc, "death re-entered, lifecycle already scheduled");
            }
            DeathHandling::NotAnNpc { combatant } => {
                info!(%combatant, "combatant died");
            }
        }
    }

    fn taunt(&mut self, npc: EntityId, taunter: EntityId, duration_ms: u64) -> Result<()> {
        if !self.world.contains(taunter) {
            return Err(CombatError::CombatantNotFound(taunter).into());
        }
        let now = self.clock.now();
        let bonus = self.orchestrator.config().threat.taunt_bonus;
        let state = self.world.npc_mut(npc)?;
        if !state.lifecycle.is_alive() {
            return Err(CombatError::AlreadyDead(npc).into());
        }
        state.threat.taunt(taunter, now, duration_ms, bonus);
        debug!(%npc, %taunter, duration_ms, "taunted");
        Ok(())
    }

    fn flee(&mut self, id: EntityId) -> Result<u8> {
        let now = self.clock.now();
        let engaged = {
            let combatant = self.world.require(id)?;
            combatant
                .engaged_target
                .filter(|_| combatant.in_combat(now))
        };
        let engaged_npc = engaged.is_some_and(|target| {
            self.world
                .get(target)
                .is_some_and(|t| t.alive && t.is_npc())
        });

        let cowardice = &self.orchestrator.config().cowardice;
        let combatant = self.world.require_mut(id)?;
        combatant.engaged_target = None;
        if !engaged_npc {
            return Ok(0);
        }
        let stacks = combatant
            .effects
            .add_cowardice_stack(now, cowardice)
            .ok_or(CombatError::EffectsFull(id))?;
        debug!(%id, stacks, "fled an engaged fight");
        Ok(stacks)
    }

    fn apply_effect(
        &mut self,
        target: EntityId,
        effect: StatusEffect,
        duration_ms: u64,
    ) -> Result<u64> {
        let now = self.clock.now();
        let dr = &self.orchestrator.config().diminishing;
        let combatant = self.world.require_mut(target)?;
        if !combatant.alive {
            return Err(CombatError::AlreadyDead(target).into());
        }
        let tag = effect.tag;
        let applied = combatant
            .effects
            .apply_timed(effect, duration_ms, now, dr)
            .ok_or(CombatError::EffectsFull(target))?;
        debug!(%target, ?tag, applied, "effect applied");
        Ok(applied)
    }

    /// Decays every ledger, purges expired effects, completes gate casts and
    /// reports who each NPC would attack.
    fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let config = self.orchestrator.config();

        for combatant in self.world.iter_mut() {
            combatant.effects.purge_expired(now);
            if let Some(npc) = combatant.npc_mut()
                && npc.lifecycle.is_alive()
            {
                npc.threat.decay(now, config.threat.decay_per_second);
            }
        }

        let mut gate_pulls = Vec::new();
        for id in self.world.ids() {
            if let Some(pull) = poll_gate(&mut self.world, id, now, config) {
                gate_pulls.push(pull);
            }
        }
        for pull in &gate_pulls {
            if let Some(ally) = self.world.get(pull.ally) {
                info!(ally = %pull.ally, target = %pull.target, "gate for help answered");
                self.orchestrator
                    .collaborators()
                    .room
                    .flavor(ally.region, format!("{} answers the call for help.", ally.name));
            }
        }

        let assist_targets = self
            .world
            .iter()
            .filter(|c| c.alive)
            .filter_map(|c| {
                let target = c.npc()?.threat.assist_target(now, &config.threat)?;
                Some(AssistTarget {
                    npc: c.id,
                    target,
                })
            })
            .collect();

        TickReport {
            at: now,
            gate_pulls,
            assist_targets,
        }
    }

    fn lifecycle_state(&self, npc: EntityId) -> Option<LifecycleState> {
        self.world
            .get(npc)
            .or_else(|| self.graveyard.get(&npc))
            .and_then(|c| c.npc())
            .map(|state| state.lifecycle.state())
    }

    fn cancel_lifecycle(&mut self, npc: EntityId) -> bool {
        let cancelled = self.scheduler.cancel(npc);
        if let Some(mut record) = self.graveyard.remove(&npc)
            && let Some(state) = record.npc_mut()
        {
            state.lifecycle.terminate();
        } else if let Ok(state) = self.world.npc_mut(npc)
            && !state.lifecycle.is_alive()
        {
            state.lifecycle.terminate();
        }
        debug!(%npc, cancelled, "lifecycle cancelled");
        cancelled
    }

    fn on_lifecycle_timer(&mut self, npc: EntityId, ticket: u64) {
        let Some(stage) = self.scheduler.take_fired(npc, ticket) else {
            trace!(%npc, ticket, "stale lifecycle timer ignored");
            return;
        };
        match stage {
            LifecycleStage::Despawn => self.despawn(npc),
            LifecycleStage::Respawn => self.respawn(npc),
        }
    }

    /// `Corpse → Despawned`, then either terminal or a respawn timer.
    fn despawn(&mut self, npc: EntityId) {
        let now = self.clock.now();
        match self.world.npc_mut(npc).map(|state| state.lifecycle.despawn()) {
            Err(_) => {
                debug!(%npc, "npc vanished before despawn");
                return;
            }
            Ok(Err(err)) => {
                warn!(%npc, %err, "despawn skipped");
                return;
            }
            Ok(Ok(())) => {}
        }
        let Some(mut corpse) = self.world.remove(npc) else {
            return;
        };

        let region = corpse.region;
        self.collaborators().room.entity_despawned(region, npc);

        let Some(state) = corpse.npc_mut() else {
            return;
        };
        state.threat.clear();
        match state
            .lifecycle
            .after_despawn(now, &self.orchestrator.config().lifecycle)
        {
            Ok(Some(respawn_at)) => {
                info!(%npc, %respawn_at, "npc despawned");
                self.graveyard.insert(npc, corpse);
                self.scheduler
                    .schedule(npc, LifecycleStage::Respawn, respawn_at);
            }
            Ok(None) => info!(%npc, "resource node despawned, left to its owner"),
            Err(err) => warn!(%npc, %err, "respawn not scheduled"),
        }
    }

    /// `Respawning → Replaced`, spawning a new instance at the live spawn
    /// point position.
    fn respawn(&mut self, npc: EntityId) {
        let now = self.clock.now();
        let Some(mut record) = self.graveyard.remove(&npc) else {
            debug!(%npc, "respawn record vanished");
            return;
        };
        let Some(state) = record.npc_mut() else {
            return;
        };
        let (LifecycleState::Respawning { .. }, Some(death)) =
            (state.lifecycle.state(), state.lifecycle.death().copied())
        else {
            warn!(%npc, state = %state.lifecycle.state(), "respawn fired in unexpected state");
            return;
        };

        let home = match death.spawn_point {
            Some(point) => match self.collaborators().spawn_points.spawn_point(point) {
                Some(position) => position,
                None => {
                    info!(%npc, %point, "spawn point gone, not respawning");
                    state.lifecycle.terminate();
                    return;
                }
            },
            None => death.home,
        };
        let prototype = match self.catalog.get(death.prototype) {
            Some(prototype) => prototype.clone(),
            None => {
                warn!(%npc, prototype = %death.prototype, "prototype missing from catalog, reusing template");
                state.prototype.clone()
            }
        };
        let name = prototype.name.clone();

        let meta = SpawnMeta {
            spawn_point: death.spawn_point,
            region: death.region,
            home,
        };
        let id = self.world.spawn_npc(prototype, meta, now);
        if let Err(err) = state.lifecycle.complete_respawn(id) {
            warn!(%npc, %err, "respawn bookkeeping failed");
        }

        let room = &self.collaborators().room;
        room.entity_spawned(
            death.region,
            EntitySpawn {
                id,
                prototype: death.prototype,
                name: name.clone(),
                position: home,
                replaces: Some(npc),
            },
        );
        room.flavor(death.region, format!("{name} appears."));
        info!(old = %npc, new = %id, "npc respawned");
    }
}
