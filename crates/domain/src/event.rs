//! Events — notification payloads pushed to observers.
//!
//! Two scopes exist: room-scoped events interest exactly one room's
//! observers, operator-scoped events interest the plant operators. Both are
//! delivered fire-and-forget with latest-value semantics — a missed event
//! is superseded by the next one, never replayed.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, RoomId};
use crate::plant::CentralUnit;
use crate::queue::{ServiceQueueEntry, WaitQueueEntry};
use crate::room::ServiceStatus;
use crate::time::{Timestamp, now};

/// A published event: payload plus identity and publication time.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<P> {
    pub id: EventId,
    pub at: Timestamp,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Envelope<P> {
    /// Stamp a payload with a fresh id and the current time.
    #[must_use]
    pub fn new(payload: P) -> Self {
        Self {
            id: EventId::new(),
            at: now(),
            payload,
        }
    }
}

/// Events scoped to a single room's observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomEvent {
    /// The metered reading moved toward the setpoint.
    TemperatureChanged {
        room_id: RoomId,
        current_temperature: f64,
    },
    /// The accrued fee grew by one tick's increment.
    FeeChanged { room_id: RoomId, accrued_fee: f64 },
    /// The room was admitted to (or promoted into) active service.
    ServiceStarted { room_id: RoomId },
    /// The room left active service or the wait queue.
    ServiceStopped { room_id: RoomId },
}

/// Events scoped to the plant operator observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperatorEvent {
    /// The plant started, stopped, or changed mode.
    PlantStatusChanged { plant: CentralUnit },
    /// Either queue changed; carries full ordered snapshots.
    QueueChanged {
        service_queue: Vec<ServiceQueueEntry>,
        wait_queue: Vec<WaitQueueEntry>,
    },
    /// A room was powered on or off.
    RoomPowerChanged {
        room_id: RoomId,
        power_on: bool,
        service_status: ServiceStatus,
    },
}
