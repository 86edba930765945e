//! Room registry — the single shared mutable state of the core.
//!
//! Rooms, both queues, and the plant state live behind one lock as a unit:
//! the serving counter is only meaningful relative to queue membership, so
//! the two must never be observable in a torn state. All mutating
//! operations (admission, control, metering ticks) serialize on this lock
//! and either fully apply or not at all.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use chiller_domain::error::CoreError;
use chiller_domain::id::RoomId;
use chiller_domain::plant::CentralUnit;
use chiller_domain::queue::{ServiceQueueEntry, WaitQueueEntry, wait_estimate};
use chiller_domain::room::{Room, ServiceStatus};

/// The authoritative set of rooms plus scheduling state.
#[derive(Debug)]
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    pub service_queue: VecDeque<ServiceQueueEntry>,
    pub wait_queue: VecDeque<WaitQueueEntry>,
    pub plant: CentralUnit,
}

/// Registry shared between the services and the metering engine.
pub type SharedRegistry = Arc<Mutex<Registry>>;

impl Registry {
    /// Create an empty registry for the given plant.
    #[must_use]
    pub fn new(plant: CentralUnit) -> Self {
        Self {
            rooms: HashMap::new(),
            service_queue: VecDeque::new(),
            wait_queue: VecDeque::new(),
            plant,
        }
    }

    /// Wrap a registry for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Add a room, replacing any previous room with the same id.
    pub fn register(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    /// Look up a room by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown ids.
    pub fn room(&self, id: &RoomId) -> Result<&Room, CoreError> {
        self.rooms.get(id).ok_or_else(|| CoreError::RoomNotFound {
            room_id: id.clone(),
        })
    }

    /// Look up a room mutably by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown ids.
    pub fn room_mut(&mut self, id: &RoomId) -> Result<&mut Room, CoreError> {
        self.rooms.get_mut(id).ok_or_else(|| CoreError::RoomNotFound {
            room_id: id.clone(),
        })
    }

    /// Iterate over all rooms in no particular order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Iterate mutably over all rooms in no particular order.
    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    /// Number of registered rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Recompute the serving counter from the room set.
    ///
    /// Always derived, never adjusted in place, so out-of-order control
    /// calls cannot make it drift.
    pub fn recompute_serving_count(&mut self) {
        self.plant.current_serving_count = self
            .rooms
            .values()
            .filter(|room| room.service_status == ServiceStatus::Serving)
            .count();
    }

    /// Remove the room's entry from whichever queue holds it (at most one).
    ///
    /// A removal from the wait queue shifts everyone behind it forward, so
    /// the remaining estimates are refreshed right away.
    pub fn remove_from_queues(&mut self, id: &RoomId) {
        self.service_queue.retain(|entry| entry.room_id != *id);
        let waiting = self.wait_queue.len();
        self.wait_queue.retain(|entry| entry.room_id != *id);
        if self.wait_queue.len() < waiting {
            self.refresh_wait_estimates();
        }
    }

    /// Recompute the FIFO-position wait estimates for every queued room.
    pub fn refresh_wait_estimates(&mut self) {
        let Self {
            rooms, wait_queue, ..
        } = self;
        for (index, entry) in wait_queue.iter_mut().enumerate() {
            let estimate = wait_estimate(index + 1);
            entry.wait_time_estimate = estimate;
            if let Some(room) = rooms.get_mut(&entry.room_id) {
                room.wait_time_estimate = estimate;
            }
        }
    }

    /// Ordered snapshots of both queues.
    #[must_use]
    pub fn queue_snapshots(&self) -> (Vec<ServiceQueueEntry>, Vec<WaitQueueEntry>) {
        (
            self.service_queue.iter().cloned().collect(),
            self.wait_queue.iter().cloned().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiller_domain::room::FanSpeed;
    use chiller_domain::time::now;

    fn registry_with_rooms(ids: &[&str]) -> Registry {
        let mut registry = Registry::new(CentralUnit::new(3));
        for id in ids {
            registry.register(Room::builder().id(*id).build().unwrap());
        }
        registry
    }

    #[test]
    fn should_return_not_found_for_unknown_room() {
        let registry = registry_with_rooms(&["301"]);
        let result = registry.room(&RoomId::new("999"));
        assert!(matches!(result, Err(CoreError::RoomNotFound { .. })));
    }

    #[test]
    fn should_recompute_serving_count_from_room_states() {
        let mut registry = registry_with_rooms(&["301", "302", "303"]);
        registry
            .room_mut(&RoomId::new("301"))
            .unwrap()
            .service_status = ServiceStatus::Serving;
        registry
            .room_mut(&RoomId::new("302"))
            .unwrap()
            .service_status = ServiceStatus::Serving;
        registry
            .room_mut(&RoomId::new("303"))
            .unwrap()
            .service_status = ServiceStatus::Waiting;

        registry.recompute_serving_count();

        assert_eq!(registry.plant.current_serving_count, 2);
    }

    #[test]
    fn should_remove_room_from_wait_queue_only() {
        let mut registry = registry_with_rooms(&["301", "302"]);
        registry.wait_queue.push_back(WaitQueueEntry {
            room_id: RoomId::new("301"),
            fan_speed: FanSpeed::Mid,
            wait_time_estimate: 30.0,
            requested_at: now(),
        });
        registry.wait_queue.push_back(WaitQueueEntry {
            room_id: RoomId::new("302"),
            fan_speed: FanSpeed::Mid,
            wait_time_estimate: 60.0,
            requested_at: now(),
        });

        registry.remove_from_queues(&RoomId::new("301"));

        assert_eq!(registry.wait_queue.len(), 1);
        assert_eq!(registry.wait_queue[0].room_id, RoomId::new("302"));
        // 302 moved to the head, so its estimate drops to one slot.
        assert_eq!(registry.wait_queue[0].wait_time_estimate, 30.0);
        assert_eq!(
            registry.room(&RoomId::new("302")).unwrap().wait_time_estimate,
            30.0
        );
    }

    #[test]
    fn should_refresh_wait_estimates_by_position() {
        let mut registry = registry_with_rooms(&["301", "302"]);
        for id in ["301", "302"] {
            registry.wait_queue.push_back(WaitQueueEntry {
                room_id: RoomId::new(id),
                fan_speed: FanSpeed::Mid,
                wait_time_estimate: 0.0,
                requested_at: now(),
            });
        }

        registry.refresh_wait_estimates();

        assert_eq!(registry.wait_queue[0].wait_time_estimate, 30.0);
        assert_eq!(registry.wait_queue[1].wait_time_estimate, 60.0);
        assert_eq!(
            registry.room(&RoomId::new("302")).unwrap().wait_time_estimate,
            60.0
        );
    }

    #[test]
    fn should_replace_room_when_registering_same_id() {
        let mut registry = registry_with_rooms(&["301"]);
        let replacement = Room::builder()
            .id("301")
            .current_temperature(22.0)
            .build()
            .unwrap();
        registry.register(replacement);

        assert_eq!(registry.room_count(), 1);
        assert_eq!(
            registry.room(&RoomId::new("301")).unwrap().current_temperature,
            22.0
        );
    }
}
