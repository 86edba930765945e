//! Room — one metered consumer of the central plant.
//!
//! A room carries the full air-conditioning state for one physical unit:
//! power, temperatures, fan speed, the fee accrued so far, and the
//! cumulative usage statistics. The metering arithmetic (temperature
//! convergence, fee accrual, session accounting) lives here so the
//! application layer only orchestrates.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};
use crate::id::RoomId;
use crate::time::{Timestamp, elapsed_minutes};

/// Lowest accepted setpoint in degrees Celsius.
pub const TARGET_TEMP_MIN: f64 = 16.0;
/// Highest accepted setpoint in degrees Celsius.
pub const TARGET_TEMP_MAX: f64 = 30.0;

/// Rooms within this band of their setpoint are considered converged and
/// stop being metered for temperature.
pub const CONVERGENCE_BAND: f64 = 0.1;

/// Fan speed of a room unit. Fee rate and power draw follow the speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    Low,
    #[default]
    Mid,
    High,
}

impl FanSpeed {
    /// Currency charged per minute of service at this speed.
    #[must_use]
    pub fn fee_rate(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Mid => 0.8,
            Self::High => 1.0,
        }
    }

    /// Power draw factor in kW, used for cumulative energy accounting.
    #[must_use]
    pub fn power_factor(self) -> f64 {
        match self {
            Self::Low => 0.8,
            Self::Mid => 1.0,
            Self::High => 1.2,
        }
    }
}

impl std::fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Mid => f.write_str("mid"),
            Self::High => f.write_str("high"),
        }
    }
}

impl std::str::FromStr for FanSpeed {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "mid" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(ValidationError::InvalidFanSpeed(other.to_string())),
        }
    }
}

/// Plant-wide operating mode, applied to rooms on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    #[default]
    Cooling,
    Heating,
}

impl AcMode {
    /// Default setpoint applied on admission when the caller does not
    /// override it.
    #[must_use]
    pub fn default_target(self) -> f64 {
        match self {
            Self::Cooling => 25.0,
            Self::Heating => 26.0,
        }
    }
}

impl std::fmt::Display for AcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cooling => f.write_str("cooling"),
            Self::Heating => f.write_str("heating"),
        }
    }
}

impl std::str::FromStr for AcMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cooling" => Ok(Self::Cooling),
            "heating" => Ok(Self::Heating),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

/// Per-room service state relative to the capacity scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Not requesting service.
    #[default]
    Idle,
    /// Actively consuming a capacity slot.
    Serving,
    /// Queued for a capacity slot.
    Waiting,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Serving => f.write_str("serving"),
            Self::Waiting => f.write_str("waiting"),
        }
    }
}

/// Full air-conditioning state of one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub power_on: bool,
    pub current_temperature: f64,
    pub target_temperature: f64,
    pub fan_speed: FanSpeed,
    pub mode: AcMode,
    /// Fee accrued since the last reset, in currency units.
    pub accrued_fee: f64,
    /// Currency per minute, derived from the fan speed.
    pub fee_rate: f64,
    pub service_status: ServiceStatus,
    /// Coarse FIFO-position estimate in seconds; non-zero only while waiting.
    pub wait_time_estimate: f64,
    pub service_start_time: Option<Timestamp>,
    /// Cumulative minutes of service across all sessions.
    pub total_duration_minutes: f64,
    /// Cumulative energy across all sessions, in kWh.
    pub total_energy_kwh: f64,
    /// Number of completed service sessions.
    pub session_count: u64,
}

impl Room {
    /// Create a builder for constructing a [`Room`].
    #[must_use]
    pub fn builder() -> RoomBuilder {
        RoomBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when the setpoint is out of range.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_target(self.target_temperature)?;
        Ok(())
    }

    /// Power the room on for a new service session.
    ///
    /// Applies the plant mode, the setpoint, the default mid fan speed and
    /// its fee rate, and stamps the session start. Queue placement is the
    /// scheduler's business, so `service_status` is left untouched.
    pub fn activate(&mut self, mode: AcMode, target: f64, at: Timestamp) {
        self.power_on = true;
        self.mode = mode;
        self.target_temperature = target;
        self.fan_speed = FanSpeed::Mid;
        self.fee_rate = self.fan_speed.fee_rate();
        self.service_start_time = Some(at);
    }

    /// Power the room off and drop it out of any service state.
    pub fn deactivate(&mut self) {
        self.power_on = false;
        self.service_status = ServiceStatus::Idle;
        self.wait_time_estimate = 0.0;
    }

    /// Change the fan speed, keeping the fee rate in sync.
    pub fn set_fan_speed(&mut self, speed: FanSpeed) {
        self.fan_speed = speed;
        self.fee_rate = speed.fee_rate();
    }

    /// Whether the room is within [`CONVERGENCE_BAND`] of its setpoint.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        (self.target_temperature - self.current_temperature).abs() < CONVERGENCE_BAND
    }

    /// Apply one temperature convergence step toward the setpoint.
    ///
    /// The new reading is `current + (target - current) * factor`, kept at
    /// 0.1° precision. A step that rounding would swallow still advances one
    /// tenth so the room always reaches its setpoint, and the reading is
    /// clamped at the setpoint so it never overshoots. Returns `true` when
    /// the reading actually changed; converged rooms are left alone.
    pub fn step_temperature(&mut self, factor: f64) -> bool {
        let diff = self.target_temperature - self.current_temperature;
        if diff.abs() < CONVERGENCE_BAND {
            return false;
        }

        let stepped = self.current_temperature + diff * factor;
        let mut next = round_tenths(stepped);
        if (next - self.current_temperature).abs() < 0.05 {
            // Rounding ate the whole step; force one tenth of progress.
            next = if diff < 0.0 {
                round_tenths(self.current_temperature - 0.1)
            } else {
                round_tenths(self.current_temperature + 0.1)
            };
        }
        next = if diff < 0.0 {
            next.max(self.target_temperature)
        } else {
            next.min(self.target_temperature)
        };

        let changed = (next - self.current_temperature).abs() > f64::EPSILON;
        self.current_temperature = next;
        changed
    }

    /// Accrue the fee for one tick of the given length.
    ///
    /// The increment is `fee_rate * seconds / 60`, and the running total is
    /// kept at 0.01 precision. Returns `true` when the total changed.
    pub fn accrue_fee(&mut self, tick_seconds: f64) -> bool {
        let increment = self.fee_rate * tick_seconds / 60.0;
        if increment <= 0.0 {
            return false;
        }
        let next = round_cents(self.accrued_fee + increment);
        let changed = (next - self.accrued_fee).abs() > f64::EPSILON;
        self.accrued_fee = next;
        changed
    }

    /// Close the current session and fold it into the cumulative statistics.
    ///
    /// No-op when no session is open.
    pub fn finalize_session(&mut self, at: Timestamp) {
        if let Some(start) = self.service_start_time.take() {
            let minutes = elapsed_minutes(start, at);
            self.total_duration_minutes += minutes;
            self.total_energy_kwh += minutes / 60.0 * self.fan_speed.power_factor();
            self.session_count += 1;
        }
    }
}

/// Validate a requested setpoint against the accepted range.
///
/// # Errors
///
/// Returns [`ValidationError::TemperatureOutOfRange`] outside
/// [`TARGET_TEMP_MIN`]..=[`TARGET_TEMP_MAX`].
pub fn validate_target(value: f64) -> Result<(), ValidationError> {
    if (TARGET_TEMP_MIN..=TARGET_TEMP_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::TemperatureOutOfRange {
            value,
            min: TARGET_TEMP_MIN,
            max: TARGET_TEMP_MAX,
        })
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Step-by-step builder for [`Room`].
#[derive(Debug, Default)]
pub struct RoomBuilder {
    id: Option<RoomId>,
    current_temperature: Option<f64>,
    target_temperature: Option<f64>,
    fan_speed: Option<FanSpeed>,
    mode: Option<AcMode>,
}

impl RoomBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<RoomId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn current_temperature(mut self, value: f64) -> Self {
        self.current_temperature = Some(value);
        self
    }

    #[must_use]
    pub fn target_temperature(mut self, value: f64) -> Self {
        self.target_temperature = Some(value);
        self
    }

    #[must_use]
    pub fn fan_speed(mut self, speed: FanSpeed) -> Self {
        self.fan_speed = Some(speed);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: AcMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Consume the builder, validate, and return a powered-off [`Room`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the setpoint is out of range.
    pub fn build(self) -> Result<Room, CoreError> {
        let mode = self.mode.unwrap_or_default();
        let fan_speed = self.fan_speed.unwrap_or_default();
        let room = Room {
            id: self.id.unwrap_or_else(|| RoomId::new("")),
            power_on: false,
            current_temperature: self.current_temperature.unwrap_or(28.0),
            target_temperature: self.target_temperature.unwrap_or_else(|| mode.default_target()),
            fan_speed,
            mode,
            accrued_fee: 0.0,
            fee_rate: fan_speed.fee_rate(),
            service_status: ServiceStatus::Idle,
            wait_time_estimate: 0.0,
            service_start_time: None,
            total_duration_minutes: 0.0,
            total_energy_kwh: 0.0,
            session_count: 0,
        };
        room.validate()?;
        Ok(room)
    }
}
