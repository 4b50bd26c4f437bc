//! Cloneable façade for issuing commands to the combat worker.
//!
//! [`CombatHandle`] hides channel plumbing and offers async helpers for every
//! combat operation plus event subscriptions. All commands are serialized by
//! the single worker that owns the shard's combat state.
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

use combat_core::{
    AssistPull, Combatant, EntityId, LifecycleState, Position, PrototypeId, RegionId,
    SpawnPointId, StatusEffect, Timestamp,
};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::exchange::{AttackRequest, ExchangeReport, HitReport};
use crate::scheduler::PendingTimer;
use crate::workers::Command;

/// Where and what to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcSpawn {
    pub prototype: PrototypeId,
    pub region: RegionId,
    /// Read from the live spawn-point cache; takes precedence over
    /// `position`.
    pub spawn_point: Option<SpawnPointId>,
    pub position: Option<Position>,
    /// Per-owner resource nodes.
    pub owner: Option<EntityId>,
}

impl NpcSpawn {
    pub fn at_point(prototype: PrototypeId, region: RegionId, spawn_point: SpawnPointId) -> Self {
        Self {
            prototype,
            region,
            spawn_point: Some(spawn_point),
            position: None,
            owner: None,
        }
    }

    pub fn at(prototype: PrototypeId, region: RegionId, position: Position) -> Self {
        Self {
            prototype,
            region,
            spawn_point: None,
            position: Some(position),
            owner: None,
        }
    }

    #[must_use]
    pub fn owned_by(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// The top threat holder an NPC would attack right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistTarget {
    pub npc: EntityId,
    pub target: EntityId,
}

/// Result of one simulation tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub at: Timestamp,
    /// Allies pulled by gate casts that completed this tick.
    pub gate_pulls: Vec<AssistPull>,
    pub assist_targets: Vec<AssistTarget>,
}

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct CombatHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl CombatHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Inserts a player or pet combatant and returns its id.
    pub async fn spawn_player(&self, combatant: Combatant) -> Result<EntityId> {
        self.request(|reply| Command::SpawnPlayer { combatant, reply })
            .await
    }

    /// Instantiates an NPC from a catalog prototype.
    pub async fn spawn_npc(&self, spawn: NpcSpawn) -> Result<EntityId> {
        self.request(|reply| Command::SpawnNpc { spawn, reply })
            .await?
    }

    /// Runs one full exchange.
    pub async fn attack(&self, request: AttackRequest) -> Result<ExchangeReport> {
        self.request(|reply| Command::Attack { request, reply })
            .await?
    }

    /// Applies raw damage through the low-level applier, bypassing the
    /// resolver and the zone policy.
    pub async fn apply_damage(
        &self,
        target: EntityId,
        amount: u32,
        source: Option<EntityId>,
    ) -> Result<HitReport> {
        self.request(|reply| Command::ApplyDamage {
            target,
            amount,
            source,
            reply,
        })
        .await?
    }

    /// Forces `npc` onto `taunter` for `duration_ms`.
    pub async fn taunt(&self, npc: EntityId, taunter: EntityId, duration_ms: u64) -> Result<()> {
        self.request(|reply| Command::Taunt {
            npc,
            taunter,
            duration_ms,
            reply,
        })
        .await?
    }

    /// Disengages `combatant` from its current target. Fleeing an engaged
    /// NPC adds a cowardice stack; returns the resulting stack count (zero
    /// when nothing was engaged).
    pub async fn flee(&self, combatant: EntityId) -> Result<u8> {
        self.request(|reply| Command::Flee { combatant, reply })
            .await?
    }

    /// Applies a timed effect with crowd-control diminishing returns.
    /// Returns the duration actually applied; fails with
    /// `CombatError::EffectsFull` when the target has no free slot.
    pub async fn apply_effect(
        &self,
        target: EntityId,
        effect: StatusEffect,
        duration_ms: u64,
    ) -> Result<u64> {
        self.request(|reply| Command::ApplyEffect {
            target,
            effect,
            duration_ms,
            reply,
        })
        .await?
    }

    /// Decays threat, purges expired effects and polls gate casts.
    pub async fn tick(&self) -> Result<TickReport> {
        self.request(|reply| Command::Tick { reply }).await
    }

    pub async fn combatant(&self, id: EntityId) -> Result<Option<Combatant>> {
        self.request(|reply| Command::QueryCombatant { id, reply })
            .await
    }

    /// Drops a combatant from the arena, as when its room goes away. Any
    /// pending lifecycle timer for it is cancelled.
    pub async fn remove(&self, id: EntityId) -> Result<Option<Combatant>> {
        self.request(|reply| Command::Remove { id, reply }).await
    }

    pub async fn lifecycle_state(&self, npc: EntityId) -> Result<Option<LifecycleState>> {
        self.request(|reply| Command::LifecycleState { npc, reply })
            .await
    }

    pub async fn pending_lifecycle(&self, npc: EntityId) -> Result<Option<PendingTimer>> {
        self.request(|reply| Command::PendingLifecycle { npc, reply })
            .await
    }

    /// Cancels the pending lifecycle timer of `npc` and ends its lifecycle.
    /// Returns whether a timer was pending.
    pub async fn cancel_lifecycle(&self, npc: EntityId) -> Result<bool> {
        self.request(|reply| Command::CancelLifecycle { npc, reply })
            .await
    }

    /// Number of NPCs with a pending despawn or respawn timer.
    pub async fn pending_lifecycle_count(&self) -> Result<usize> {
        self.request(|reply| Command::PendingLifecycleCount { reply })
            .await
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Combat` - Exchange results and entity updates
    /// - `Topic::Lifecycle` - Despawns and respawns
    /// - `Topic::Room` - Flavor lines
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use runtime::Topic;
    ///
    /// let mut lifecycle_rx = handle.subscribe(Topic::Lifecycle);
    /// while let Ok(event) = lifecycle_rx.recv().await {
    ///     // Handle despawn/respawn events
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    ///
    /// Returns a map of topic to receiver for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }
}
