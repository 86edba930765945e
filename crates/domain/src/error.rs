//! Common error types used across the workspace.
//!
//! Rejected requests are ordinary error values, never panics. An admission
//! attempt against a stopped plant is a legitimate outcome reported as
//! [`CoreError::PlantOffline`], and validation always runs before any state
//! is mutated, so a failed operation never partially applies.

use crate::id::RoomId;

/// Top-level error for all core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The room id is not registered.
    #[error("room {room_id} not found")]
    RoomNotFound {
        /// The id that failed to resolve.
        room_id: RoomId,
    },

    /// Admission was attempted while the central unit is off.
    #[error("central unit is not running")]
    PlantOffline,

    /// Input validation failed; no state was touched.
    #[error("validation error")]
    Validation(#[from] ValidationError),
}

/// Input validation failures, reported before any mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The fan speed string did not name a known speed.
    #[error("invalid fan speed: {0:?}")]
    InvalidFanSpeed(String),

    /// The mode string did not name a known operating mode.
    #[error("invalid mode: {0:?}")]
    InvalidMode(String),

    /// The requested setpoint is outside the accepted range.
    #[error("target temperature {value} outside {min}..={max}")]
    TemperatureOutOfRange {
        /// The rejected setpoint.
        value: f64,
        /// Lower bound of the accepted range.
        min: f64,
        /// Upper bound of the accepted range.
        max: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_describe_missing_room() {
        let err = CoreError::RoomNotFound {
            room_id: RoomId::new("301"),
        };
        assert_eq!(err.to_string(), "room 301 not found");
    }

    #[test]
    fn should_convert_validation_error_into_core_error() {
        let err: CoreError = ValidationError::InvalidFanSpeed("turbo".to_string()).into();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidFanSpeed(_))
        ));
    }

    #[test]
    fn should_describe_out_of_range_setpoint() {
        let err = ValidationError::TemperatureOutOfRange {
            value: 40.0,
            min: 16.0,
            max: 30.0,
        };
        assert_eq!(err.to_string(), "target temperature 40 outside 16..=30");
    }
}
