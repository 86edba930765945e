//! Central unit — plant-wide run state and the capacity ceiling.

use serde::{Deserialize, Serialize};

use crate::room::AcMode;

/// Singleton state of the central air-conditioning plant.
///
/// `current_serving_count` mirrors the number of rooms currently in the
/// `Serving` state. It is always recomputed from the room set by the
/// registry, never incremented or decremented in place, so it cannot drift
/// under out-of-order control calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralUnit {
    pub is_running: bool,
    pub mode: AcMode,
    pub max_concurrent_serving: usize,
    pub current_serving_count: usize,
}

impl CentralUnit {
    /// Create a stopped plant with the given capacity ceiling.
    #[must_use]
    pub fn new(max_concurrent_serving: usize) -> Self {
        Self {
            is_running: false,
            mode: AcMode::default(),
            max_concurrent_serving,
            current_serving_count: 0,
        }
    }

    /// Whether a further room can be admitted to active service.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.current_serving_count < self.max_concurrent_serving
    }

    /// Transition to `On(mode)`. Valid from both `Off` and `On`.
    pub fn start(&mut self, mode: AcMode) {
        self.is_running = true;
        self.mode = mode;
    }

    /// Transition to `Off`.
    pub fn stop(&mut self) {
        self.is_running = false;
    }
}
