//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use combat_core::{EntityId, RegionId};

use super::types::{CombatEvent, LifecycleEvent, RoomEvent};
use crate::api::{EntitySpawn, EntityUpdate, RoomBroadcaster};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Exchange results and entity updates
    Combat,
    /// Despawn and respawn transitions
    Lifecycle,
    /// Flavor lines
    Room,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Combat, Topic::Lifecycle, Topic::Room];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Combat(CombatEvent),
    Lifecycle(LifecycleEvent),
    Room(RoomEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Combat(_) => Topic::Combat,
            Event::Lifecycle(_) => Topic::Lifecycle,
            Event::Room(_) => Topic::Room,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Channels are created up front and never change,
/// so publishing needs no lock.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<HashMap<Topic, broadcast::Sender<Event>>>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity.max(1)).0))
            .collect();

        Self {
            channels: Arc::new(channels),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        // Every topic is inserted by `with_capacity`.
        &self.channels[&topic]
    }

    /// Publish an event to its corresponding topic. Best-effort.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomBroadcaster for EventBus {
    fn entity_update(&self, region: RegionId, update: EntityUpdate) {
        self.publish(Event::Combat(CombatEvent::EntityUpdated { region, update }));
    }

    fn entity_spawned(&self, region: RegionId, spawn: EntitySpawn) {
        self.publish(Event::Lifecycle(LifecycleEvent::Spawned { region, spawn }));
    }

    fn entity_despawned(&self, region: RegionId, npc: EntityId) {
        self.publish(Event::Lifecycle(LifecycleEvent::Despawned { region, npc }));
    }

    fn flavor(&self, region: RegionId, line: String) {
        self.publish(Event::Room(RoomEvent { region, line }));
    }
}
