//! Topic-based event bus for runtime events.
//!
//! Exchanges publish to [`Topic::Combat`], the lifecycle scheduler to
//! [`Topic::Lifecycle`], and flavor text goes to [`Topic::Room`]. The bus is
//! also the default [`crate::api::RoomBroadcaster`].

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{CombatEvent, LifecycleEvent, RoomEvent};
