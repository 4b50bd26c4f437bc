//! Despawn/respawn timers.
//!
//! Each pending timer is a sleeping task that, when it wakes, sends a
//! [`Command::LifecycleTimer`] back to the combat worker. Timers only hold a
//! weak sender: once the worker and every handle are gone the fire becomes a
//! silent no-op. At most one timer is pending per NPC; scheduling again
//! replaces it, and a fire whose ticket no longer matches is ignored.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use combat_core::{EntityId, Timestamp};

use crate::workers::Command;

/// Maps runtime instants onto the millisecond [`Timestamp`]s the core uses.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin: Instant,
}

impl RuntimeClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        let elapsed = self.origin.elapsed().as_millis();
        Timestamp::from_millis(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.origin + Duration::from_millis(at.as_millis())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStage {
    Despawn,
    Respawn,
}

/// Public view of a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimer {
    pub stage: LifecycleStage,
    pub fires_at: Timestamp,
}

struct TimerEntry {
    ticket: u64,
    pending: PendingTimer,
    abort: AbortHandle,
}

pub struct LifecycleScheduler {
    commands: mpsc::WeakSender<Command>,
    clock: RuntimeClock,
    next_ticket: u64,
    timers: HashMap<EntityId, TimerEntry>,
}

impl LifecycleScheduler {
    pub fn new(commands: mpsc::WeakSender<Command>, clock: RuntimeClock) -> Self {
        Self {
            commands,
            clock,
            next_ticket: 0,
            timers: HashMap::new(),
        }
    }

    /// Schedules `stage` for `npc` at `fires_at`, replacing any pending
    /// timer for the same NPC.
    pub fn schedule(&mut self, npc: EntityId, stage: LifecycleStage, fires_at: Timestamp) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let deadline = self.clock.instant_at(fires_at);
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(tx) = commands.upgrade() else {
                trace!(%npc, ?stage, "lifecycle timer fired after shutdown");
                return;
            };
            if tx.send(Command::LifecycleTimer { npc, ticket }).await.is_err() {
                trace!(%npc, ?stage, "combat worker gone before lifecycle timer fired");
            }
        });

        let entry = TimerEntry {
            ticket,
            pending: PendingTimer { stage, fires_at },
            abort: task.abort_handle(),
        };
        if let Some(previous) = self.timers.insert(npc, entry) {
            previous.abort.abort();
        }
        trace!(%npc, ?stage, %fires_at, ticket, "lifecycle timer scheduled");
    }

    pub fn pending(&self, npc: EntityId) -> Option<PendingTimer> {
        self.timers.get(&npc).map(|entry| entry.pending)
    }

    /// Cancels the pending timer of `npc`. Returns whether one existed.
    pub fn cancel(&mut self, npc: EntityId) -> bool {
        match self.timers.remove(&npc) {
            Some(entry) => {
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Claims a fired timer. Returns `None` for stale or cancelled tickets.
    pub fn take_fired(&mut self, npc: EntityId, ticket: u64) -> Option<LifecycleStage> {
        if self.timers.get(&npc)?.ticket != ticket {
            return None;
        }
        self.timers.remove(&npc).map(|entry| entry.pending.stage)
    }

    /// Number of NPCs with a pending timer.
    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for LifecycleScheduler {
    fn drop(&mut self) {
        for entry in self.timers.values() {
            entry.abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired(rx: &mut mpsc::Receiver<Command>) -> Option<(EntityId, u64)> {
        match rx.try_recv().ok()? {
            Command::LifecycleTimer { npc, ticket } => Some((npc, ticket)),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_at_its_deadline() {
        let (tx, mut rx) = mpsc::channel(8);
        let clock = RuntimeClock::start();
        let mut scheduler = LifecycleScheduler::new(tx.downgrade(), clock);

        scheduler.schedule(EntityId(1), LifecycleStage::Despawn, Timestamp::from_millis(500));
        assert_eq!(
            scheduler.pending(EntityId(1)),
            Some(PendingTimer {
                stage: LifecycleStage::Despawn,
                fires_at: Timestamp::from_millis(500)
            })
        );

        tokio::time::advance(Duration::from_millis(499)).await;
        tokio::task::yield_now().await;
        assert!(fired(&mut rx).is_none());

        tokio::time::advance(Duration::from_millis(1)).await;
        let (npc, ticket) = rx.recv().await.and_then(|cmd| match cmd {
            Command::LifecycleTimer { npc, ticket } => Some((npc, ticket)),
            _ => None,
        }).unwrap();
        assert_eq!(npc, EntityId(1));
        assert_eq!(scheduler.take_fired(npc, ticket), Some(LifecycleStage::Despawn));
        assert_eq!(scheduler.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_invalidates_the_old_ticket() {
        let (tx, _rx) = mpsc::channel(8);
        let mut scheduler = LifecycleScheduler::new(tx.downgrade(), RuntimeClock::start());

        scheduler.schedule(EntityId(2), LifecycleStage::Despawn, Timestamp::from_millis(100));
        scheduler.schedule(EntityId(2), LifecycleStage::Respawn, Timestamp::from_millis(900));

        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.take_fired(EntityId(2), 0), None);
        assert_eq!(scheduler.take_fired(EntityId(2), 1), Some(LifecycleStage::Respawn));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = LifecycleScheduler::new(tx.downgrade(), RuntimeClock::start());

        scheduler.schedule(EntityId(3), LifecycleStage::Despawn, Timestamp::from_millis(100));
        assert!(scheduler.cancel(EntityId(3)));
        assert!(!scheduler.cancel(EntityId(3)));

        tokio::time::advance(Duration::from_millis(1_000)).await;
        tokio::task::yield_now().await;
        assert!(fired(&mut rx).is_none());
    }
}
