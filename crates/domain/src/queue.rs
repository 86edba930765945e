//! Queue entries — ephemeral FIFO records for served and waiting rooms.

use serde::{Deserialize, Serialize};

use crate::id::RoomId;
use crate::room::FanSpeed;
use crate::time::Timestamp;

/// Seconds of estimated wait per FIFO position ahead of a queued room.
///
/// A coarse display hint, not an SLA-backed prediction.
pub const WAIT_SLOT_SECONDS: f64 = 30.0;

/// Wait-time estimate for a 1-based position in the wait queue.
#[must_use]
pub fn wait_estimate(position: usize) -> f64 {
    position as f64 * WAIT_SLOT_SECONDS
}

/// Record of a room currently holding a capacity slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceQueueEntry {
    pub room_id: RoomId,
    pub fan_speed: FanSpeed,
    pub current_temperature: f64,
    pub target_temperature: f64,
    pub started_at: Timestamp,
}

/// Record of a room queued for a capacity slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitQueueEntry {
    pub room_id: RoomId,
    pub fan_speed: FanSpeed,
    pub wait_time_estimate: f64,
    pub requested_at: Timestamp,
}
