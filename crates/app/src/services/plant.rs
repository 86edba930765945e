//! Central unit controller — plant-wide run state and the stop cascade.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use chiller_domain::event::{Envelope, OperatorEvent, RoomEvent};
use chiller_domain::id::RoomId;
use chiller_domain::plant::CentralUnit;
use chiller_domain::queue::{ServiceQueueEntry, WaitQueueEntry};
use chiller_domain::room::{AcMode, ServiceStatus};
use chiller_domain::time::now;

use crate::broadcaster::EventBroadcaster;
use crate::registry::SharedRegistry;
use crate::services::scheduler::{publish_queue_snapshot, rebalance};

/// Introspection snapshot for health queries.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub plant: CentralUnit,
    pub room_count: usize,
    pub observer_count: usize,
}

/// An operator-scope subscription: snapshots at join time plus the live feed.
pub struct OperatorSubscription {
    pub plant: CentralUnit,
    pub service_queue: Vec<ServiceQueueEntry>,
    pub wait_queue: Vec<WaitQueueEntry>,
    pub receiver: broadcast::Receiver<Envelope<OperatorEvent>>,
}

/// Application service for plant start/stop and plant-level snapshots.
pub struct PlantController {
    registry: SharedRegistry,
    broadcaster: Arc<EventBroadcaster>,
}

impl PlantController {
    /// Create a controller over the shared registry.
    pub fn new(registry: SharedRegistry, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Start the plant in the given mode (also switches mode while running),
    /// then promote any rooms already waiting for capacity.
    pub async fn start(&self, mode: AcMode) {
        let mut registry = self.registry.lock().await;
        registry.plant.start(mode);

        self.broadcaster
            .publish_operator(OperatorEvent::PlantStatusChanged {
                plant: registry.plant.clone(),
            });
        let promoted = rebalance(&mut registry, &self.broadcaster);
        if promoted > 0 {
            publish_queue_snapshot(&registry, &self.broadcaster);
        }

        tracing::info!(%mode, promoted, "plant started");
    }

    /// Stop the plant and cascade: every powered-on room is forced idle and
    /// off, both queues are cleared, and the serving counter drops to zero.
    ///
    /// Serving rooms get their session folded into the cumulative
    /// statistics, same as a normal release. A single plant status
    /// broadcast and one empty queue snapshot follow the cascade.
    pub async fn stop(&self) {
        let mut registry = self.registry.lock().await;
        let at = now();

        let affected: Vec<RoomId> = registry
            .rooms()
            .filter(|room| room.power_on)
            .map(|room| room.id.clone())
            .collect();

        for room in registry.rooms_mut() {
            if !room.power_on {
                continue;
            }
            if room.service_status == ServiceStatus::Serving {
                room.finalize_session(at);
            } else {
                room.service_start_time = None;
            }
            room.deactivate();
        }

        registry.service_queue.clear();
        registry.wait_queue.clear();
        registry.plant.stop();
        registry.recompute_serving_count();

        for room_id in &affected {
            self.broadcaster.publish_room(
                room_id,
                RoomEvent::ServiceStopped {
                    room_id: room_id.clone(),
                },
            );
        }
        self.broadcaster
            .publish_operator(OperatorEvent::PlantStatusChanged {
                plant: registry.plant.clone(),
            });
        publish_queue_snapshot(&registry, &self.broadcaster);

        tracing::info!(rooms = affected.len(), "plant stopped");
    }

    /// Plant state snapshot.
    pub async fn status(&self) -> CentralUnit {
        self.registry.lock().await.plant.clone()
    }

    /// Health/introspection snapshot: plant state, room count, and the
    /// number of attached observers.
    pub async fn health(&self) -> HealthReport {
        let registry = self.registry.lock().await;
        HealthReport {
            plant: registry.plant.clone(),
            room_count: registry.room_count(),
            observer_count: self.broadcaster.observer_count(),
        }
    }

    /// Subscribe to the operator scope, with immediate plant and queue
    /// snapshots so late joiners are not left stale.
    pub async fn watch_operator(&self) -> OperatorSubscription {
        let registry = self.registry.lock().await;
        let receiver = self.broadcaster.subscribe_operator();
        let (service_queue, wait_queue) = registry.queue_snapshots();
        OperatorSubscription {
            plant: registry.plant.clone(),
            service_queue,
            wait_queue,
            receiver,
        }
    }
}
