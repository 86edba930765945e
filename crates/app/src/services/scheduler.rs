//! Capacity scheduler — admission control under the plant's capacity
//! ceiling, FIFO queuing of excess demand, and promotion of waiting rooms.
//!
//! Admission never blocks: a request is answered immediately with either
//! `Serving` or `Waiting`. Promotion happens only through [`rebalance`],
//! which runs after every release and after the plant starts, so the
//! promotion order is always the FIFO order of the wait queue.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use chiller_domain::error::CoreError;
use chiller_domain::event::{Envelope, OperatorEvent, RoomEvent};
use chiller_domain::id::RoomId;
use chiller_domain::queue::{ServiceQueueEntry, WaitQueueEntry, wait_estimate};
use chiller_domain::room::{AcMode, FanSpeed, Room, ServiceStatus, validate_target};
use chiller_domain::time::now;

use crate::broadcaster::EventBroadcaster;
use crate::registry::{Registry, SharedRegistry};

/// What an admission request resolved to, echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionOutcome {
    pub status: ServiceStatus,
    pub mode: AcMode,
    pub target_temperature: f64,
    pub fan_speed: FanSpeed,
    pub fee_rate: f64,
    pub wait_time_estimate: f64,
}

/// A room-scope subscription: the snapshot at join time plus the live feed.
pub struct RoomSubscription {
    pub room: Room,
    pub receiver: broadcast::Receiver<Envelope<RoomEvent>>,
}

/// Application service for admission, release, and per-room settings.
pub struct CapacityScheduler {
    registry: SharedRegistry,
    broadcaster: Arc<EventBroadcaster>,
}

impl CapacityScheduler {
    /// Create a scheduler over the shared registry.
    pub fn new(registry: SharedRegistry, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Request service for a room: admit it below the capacity ceiling,
    /// queue it otherwise.
    ///
    /// Applies the plant mode, the mode-dependent default setpoint (unless
    /// `requested_target` overrides it), the mid fan speed and its fee
    /// rate. A repeated request drops the room's previous queue entry and
    /// re-admits it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms,
    /// [`CoreError::PlantOffline`] while the plant is stopped, and
    /// [`CoreError::Validation`] for an out-of-range setpoint override —
    /// all before any state changes.
    pub async fn request_service(
        &self,
        room_id: &RoomId,
        current_temperature: Option<f64>,
        requested_target: Option<f64>,
    ) -> Result<AdmissionOutcome, CoreError> {
        if let Some(target) = requested_target {
            validate_target(target)?;
        }

        let mut registry = self.registry.lock().await;
        registry.room(room_id)?;
        if !registry.plant.is_running {
            return Err(CoreError::PlantOffline);
        }

        registry.remove_from_queues(room_id);
        registry.room_mut(room_id)?.service_status = ServiceStatus::Idle;
        registry.recompute_serving_count();

        let mode = registry.plant.mode;
        let target = requested_target.unwrap_or_else(|| mode.default_target());
        let admitted = registry.plant.has_capacity();
        let estimate = if admitted {
            0.0
        } else {
            wait_estimate(registry.wait_queue.len() + 1)
        };
        let at = now();

        let (fan_speed, fee_rate, current) = {
            let room = registry.room_mut(room_id)?;
            if let Some(value) = current_temperature {
                room.current_temperature = value;
            }
            room.activate(mode, target, at);
            room.service_status = if admitted {
                ServiceStatus::Serving
            } else {
                ServiceStatus::Waiting
            };
            room.wait_time_estimate = estimate;
            (room.fan_speed, room.fee_rate, room.current_temperature)
        };

        let status = if admitted {
            registry.service_queue.push_back(ServiceQueueEntry {
                room_id: room_id.clone(),
                fan_speed,
                current_temperature: current,
                target_temperature: target,
                started_at: at,
            });
            ServiceStatus::Serving
        } else {
            registry.wait_queue.push_back(WaitQueueEntry {
                room_id: room_id.clone(),
                fan_speed,
                wait_time_estimate: estimate,
                requested_at: at,
            });
            ServiceStatus::Waiting
        };
        registry.recompute_serving_count();

        if admitted {
            self.broadcaster.publish_room(
                room_id,
                RoomEvent::ServiceStarted {
                    room_id: room_id.clone(),
                },
            );
        }
        self.broadcaster
            .publish_operator(OperatorEvent::RoomPowerChanged {
                room_id: room_id.clone(),
                power_on: true,
                service_status: status,
            });
        publish_queue_snapshot(&registry, &self.broadcaster);

        tracing::info!(
            room = %room_id,
            %status,
            serving = registry.plant.current_serving_count,
            "service requested"
        );

        Ok(AdmissionOutcome {
            status,
            mode,
            target_temperature: target,
            fan_speed,
            fee_rate,
            wait_time_estimate: estimate,
        })
    }

    /// Stop service for a room and rebalance freed capacity.
    ///
    /// Idempotent: stopping an idle room powers it off again and changes
    /// nothing else. A room that had been serving gets its session folded
    /// into the cumulative statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn stop_service(&self, room_id: &RoomId) -> Result<(), CoreError> {
        let mut registry = self.registry.lock().await;
        let at = now();

        {
            let room = registry.room_mut(room_id)?;
            if room.service_status == ServiceStatus::Serving {
                room.finalize_session(at);
            } else {
                room.service_start_time = None;
            }
            room.deactivate();
        }

        registry.remove_from_queues(room_id);
        registry.recompute_serving_count();
        let promoted = rebalance(&mut registry, &self.broadcaster);

        self.broadcaster.publish_room(
            room_id,
            RoomEvent::ServiceStopped {
                room_id: room_id.clone(),
            },
        );
        self.broadcaster
            .publish_operator(OperatorEvent::RoomPowerChanged {
                room_id: room_id.clone(),
                power_on: false,
                service_status: ServiceStatus::Idle,
            });
        publish_queue_snapshot(&registry, &self.broadcaster);

        tracing::info!(room = %room_id, promoted, "service stopped");
        Ok(())
    }

    /// Change a room's fan speed, keeping the fee rate in sync.
    ///
    /// Never moves the room between `Serving` and `Waiting`: a capacity
    /// slot is consumed per room regardless of fan speed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn set_fan_speed(&self, room_id: &RoomId, speed: FanSpeed) -> Result<(), CoreError> {
        let mut registry = self.registry.lock().await;
        registry.room_mut(room_id)?.set_fan_speed(speed);
        for entry in &mut registry.service_queue {
            if entry.room_id == *room_id {
                entry.fan_speed = speed;
            }
        }
        for entry in &mut registry.wait_queue {
            if entry.room_id == *room_id {
                entry.fan_speed = speed;
            }
        }
        tracing::debug!(room = %room_id, %speed, "fan speed changed");
        Ok(())
    }

    /// Change a room's setpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an out-of-range setpoint (before
    /// any mutation) and [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn set_target_temperature(
        &self,
        room_id: &RoomId,
        target: f64,
    ) -> Result<(), CoreError> {
        validate_target(target)?;
        let mut registry = self.registry.lock().await;
        registry.room_mut(room_id)?.target_temperature = target;
        for entry in &mut registry.service_queue {
            if entry.room_id == *room_id {
                entry.target_temperature = target;
            }
        }
        tracing::debug!(room = %room_id, target, "setpoint changed");
        Ok(())
    }

    /// Reset a room's accrued fee to zero.
    ///
    /// Called by the checkout collaborator once the fee has been settled;
    /// nothing inside the core ever resets a fee.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn reset_fee(&self, room_id: &RoomId) -> Result<(), CoreError> {
        let mut registry = self.registry.lock().await;
        registry.room_mut(room_id)?.accrued_fee = 0.0;
        tracing::info!(room = %room_id, "fee reset");
        Ok(())
    }

    /// Full state snapshot of one room.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn room_status(&self, room_id: &RoomId) -> Result<Room, CoreError> {
        let registry = self.registry.lock().await;
        Ok(registry.room(room_id)?.clone())
    }

    /// Ordered snapshot of the service queue.
    pub async fn service_queue(&self) -> Vec<ServiceQueueEntry> {
        self.registry.lock().await.queue_snapshots().0
    }

    /// Ordered snapshot of the wait queue.
    pub async fn wait_queue(&self) -> Vec<WaitQueueEntry> {
        self.registry.lock().await.queue_snapshots().1
    }

    /// Subscribe to one room's events, with an immediate snapshot so late
    /// joiners are not left stale.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RoomNotFound`] for unknown rooms.
    pub async fn watch_room(&self, room_id: &RoomId) -> Result<RoomSubscription, CoreError> {
        // Take the lock before subscribing: publishers publish under the
        // same lock, so no event can slip between snapshot and feed. The
        // lookup comes first — a failed watch must not leave a channel
        // behind for an id that does not exist.
        let registry = self.registry.lock().await;
        let room = registry.room(room_id)?.clone();
        let receiver = self.broadcaster.subscribe_room(room_id);
        Ok(RoomSubscription { room, receiver })
    }
}

/// Promote waiting rooms into freed capacity slots, FIFO.
///
/// Runs after every release and after the plant starts. Returns the number
/// of rooms promoted; the caller is responsible for publishing the final
/// queue snapshot once its own mutations are complete.
pub(crate) fn rebalance(registry: &mut Registry, broadcaster: &EventBroadcaster) -> usize {
    let mut promoted = 0;
    while registry.plant.is_running
        && registry.plant.has_capacity()
        && let Some(entry) = registry.wait_queue.pop_front()
    {
        let at = now();
        let Ok(room) = registry.room_mut(&entry.room_id) else {
            // Entry for a room that has since been unregistered; drop it.
            continue;
        };
        room.service_status = ServiceStatus::Serving;
        room.wait_time_estimate = 0.0;
        let service_entry = ServiceQueueEntry {
            room_id: entry.room_id.clone(),
            fan_speed: room.fan_speed,
            current_temperature: room.current_temperature,
            target_temperature: room.target_temperature,
            started_at: at,
        };
        registry.service_queue.push_back(service_entry);
        registry.recompute_serving_count();

        broadcaster.publish_room(
            &entry.room_id,
            RoomEvent::ServiceStarted {
                room_id: entry.room_id.clone(),
            },
        );
        tracing::info!(room = %entry.room_id, "promoted from wait queue");
        promoted += 1;
    }
    if promoted > 0 {
        registry.refresh_wait_estimates();
    }
    promoted
}

pub(crate) fn publish_queue_snapshot(registry: &Registry, broadcaster: &EventBroadcaster) {
    let (service_queue, wait_queue) = registry.queue_snapshots();
    broadcaster.publish_operator(OperatorEvent::QueueChanged {
        service_queue,
        wait_queue,
    });
}
