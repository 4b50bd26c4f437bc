//! High-level runtime orchestrator.
//!
//! The runtime owns the combat worker, wires up command/event channels and
//! collaborators, and exposes a builder-based API for embedding the combat
//! engine in a shard.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use combat_content::PrototypeCatalog;
use combat_core::{CombatConfig, PcgRolls, RollSource, ShardId};

use crate::api::{
    AllowAllZones, CollaboratorKind, Collaborators, CombatHandle, DamageEngine,
    DiscardProgression, InMemorySpawnPoints, NoRewards, ProgressionSink, Result, RewardSource,
    RoomBroadcaster, RuntimeError, SpawnPointCache, ZonePolicy,
};
use crate::events::EventBus;
use crate::exchange::AttackOrchestrator;
use crate::scheduler::{LifecycleScheduler, RuntimeClock};
use crate::workers::{Command, CombatWorker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub combat: CombatConfig,
    pub shard: ShardId,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            combat: CombatConfig::default(),
            shard: ShardId::default(),
            event_buffer_size: 100,
            command_buffer_size: 32,
        }
    }
}

/// Main runtime hosting one shard's combat worker
///
/// [`CombatHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: CombatHandle,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> CombatHandle {
        self.handle.clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        self.handle.event_bus()
    }

    /// Stops the worker after the commands already queued. Pending lifecycle
    /// timers are dropped.
    pub async fn shutdown(self) -> Result<()> {
        match self.handle.shutdown().await {
            // The worker is already gone; joining reports how it ended.
            Ok(()) | Err(RuntimeError::CommandChannelClosed) => {}
            Err(err) => return Err(err),
        }
        drop(self.handle);

        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
///
/// Only the damage engine is required; every other collaborator has a
/// permissive default.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    catalog: PrototypeCatalog,
    damage: Option<Arc<dyn DamageEngine>>,
    rewards: Option<Arc<dyn RewardSource>>,
    zone: Option<Arc<dyn ZonePolicy>>,
    spawn_points: Option<Arc<dyn SpawnPointCache>>,
    progression: Option<Arc<dyn ProgressionSink>>,
    room: Option<Arc<dyn RoomBroadcaster>>,
    rolls: Option<Box<dyn RollSource>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            catalog: PrototypeCatalog::new(),
            damage: None,
            rewards: None,
            zone: None,
            spawn_points: None,
            progression: None,
            room: None,
            rolls: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Override only the combat rules
    pub fn combat_config(mut self, combat: CombatConfig) -> Self {
        self.config.combat = combat;
        self
    }

    /// NPC prototypes available to spawns and respawns
    pub fn catalog(mut self, catalog: PrototypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set required damage engine
    pub fn damage_engine(mut self, engine: impl DamageEngine + 'static) -> Self {
        self.damage = Some(Arc::new(engine));
        self
    }

    /// Reward source (default: [`NoRewards`])
    pub fn rewards(mut self, rewards: impl RewardSource + 'static) -> Self {
        self.rewards = Some(Arc::new(rewards));
        self
    }

    /// Zone policy (default: [`AllowAllZones`])
    pub fn zone_policy(mut self, zone: impl ZonePolicy + 'static) -> Self {
        self.zone = Some(Arc::new(zone));
        self
    }

    /// Live spawn-point cache (default: an empty [`InMemorySpawnPoints`])
    pub fn spawn_points(mut self, spawn_points: impl SpawnPointCache + 'static) -> Self {
        self.spawn_points = Some(Arc::new(spawn_points));
        self
    }

    /// Progression sink (default: [`DiscardProgression`])
    pub fn progression(mut self, progression: impl ProgressionSink + 'static) -> Self {
        self.progression = Some(Arc::new(progression));
        self
    }

    /// Room broadcaster (default: the runtime's own event bus)
    pub fn broadcaster(mut self, room: impl RoomBroadcaster + 'static) -> Self {
        self.room = Some(Arc::new(room));
        self
    }

    /// Roll source (default: [`PcgRolls`] seeded from the combat config, or
    /// randomly when no seed is configured)
    pub fn rolls(mut self, rolls: impl RollSource + 'static) -> Self {
        self.rolls = Some(Box::new(rolls));
        self
    }

    /// Build the runtime
    pub async fn build(self) -> Result<Runtime> {
        let damage = self.damage.ok_or(RuntimeError::MissingCollaborator {
            kind: CollaboratorKind::DamageEngine,
        })?;

        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let handle = CombatHandle::new(command_tx.clone(), event_bus.clone());

        let collaborators = Collaborators {
            damage,
            rewards: self.rewards.unwrap_or_else(|| Arc::new(NoRewards)),
            zone: self.zone.unwrap_or_else(|| Arc::new(AllowAllZones)),
            spawn_points: self
                .spawn_points
                .unwrap_or_else(|| Arc::new(InMemorySpawnPoints::new())),
            progression: self
                .progression
                .unwrap_or_else(|| Arc::new(DiscardProgression)),
            room: self
                .room
                .unwrap_or_else(|| Arc::new(event_bus.clone())),
        };

        let seed = self.config.combat.seed;
        let rolls = self.rolls.unwrap_or_else(|| {
            let seed = seed.unwrap_or_else(rand::random);
            tracing::debug!(seed, "seeding combat rolls");
            Box::new(PcgRolls::new(seed))
        });

        let clock = RuntimeClock::start();
        let scheduler = LifecycleScheduler::new(command_tx.downgrade(), clock);
        drop(command_tx);

        let orchestrator = AttackOrchestrator::new(
            Arc::new(self.config.combat),
            collaborators,
            self.config.shard,
        );
        let worker = CombatWorker::new(
            orchestrator,
            rolls,
            self.catalog,
            scheduler,
            clock,
            command_rx,
            event_bus,
        );

        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(Runtime {
            handle,
            worker_handle,
        })
    }
}
