//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `chillerd.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use chiller_domain::room::AcMode;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Central unit settings.
    pub plant: PlantConfig,
    /// Metering loop settings.
    pub metering: MeteringConfig,
    /// Room seeding settings.
    pub rooms: RoomsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Central unit configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    /// Maximum number of rooms served at once.
    pub max_serving: usize,
    /// Operating mode the plant starts in.
    pub mode: AcMode,
    /// Start the plant immediately instead of waiting for an operator.
    pub running_on_start: bool,
}

/// Metering loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Seconds between metering ticks.
    pub tick_seconds: f64,
    /// Fraction of the remaining temperature gap closed per tick.
    pub convergence_factor: f64,
}

/// Room seeding configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Number of the first room to seed.
    pub first_room: u32,
    /// How many consecutive rooms to seed.
    pub count: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `chillerd.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("chillerd.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHILLERD_MAX_SERVING") {
            if let Ok(max) = val.parse() {
                self.plant.max_serving = max;
            }
        }
        if let Ok(val) = std::env::var("CHILLERD_MODE") {
            if let Ok(mode) = val.parse() {
                self.plant.mode = mode;
            }
        }
        if let Ok(val) = std::env::var("CHILLERD_TICK_SECONDS") {
            if let Ok(seconds) = val.parse() {
                self.metering.tick_seconds = seconds;
            }
        }
        if let Ok(val) = std::env::var("CHILLERD_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plant.max_serving == 0 {
            return Err(ConfigError::Validation(
                "plant.max_serving must be non-zero".to_string(),
            ));
        }
        if self.metering.tick_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "metering.tick_seconds must be positive".to_string(),
            ));
        }
        if self.metering.convergence_factor <= 0.0 || self.metering.convergence_factor > 1.0 {
            return Err(ConfigError::Validation(
                "metering.convergence_factor must be in (0, 1]".to_string(),
            ));
        }
        if self.rooms.count == 0 {
            return Err(ConfigError::Validation(
                "rooms.count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Room numbers to seed at startup.
    pub fn room_numbers(&self) -> impl Iterator<Item = u32> {
        self.rooms.first_room..self.rooms.first_room + self.rooms.count
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            max_serving: 30,
            mode: AcMode::Cooling,
            running_on_start: false,
        }
    }
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 2.0,
            convergence_factor: 0.1,
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            first_room: 301,
            count: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chillerd=info,chiller=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
