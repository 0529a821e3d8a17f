//! Application configuration management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::racing::{PowerHoldPolicy, ResistanceThresholds};
use crate::sensors::hardware::HardwareTrainerConfig;
use crate::sensors::synthetic::SyntheticValues;
use crate::sensors::transport::BtleTransportConfig;
use crate::world::ghosts::GhostDifficulty;
use crate::world::physics::{PhysicsConfig, AIR_DENSITY, BIKE_MASS, DEFAULT_CDA, DEFAULT_CRR};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Rider physical profile
    pub rider: RiderSettings,
    /// Trainer backend settings
    pub trainer: TrainerSettings,
    /// Race setup
    pub race: RaceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            rider: RiderSettings::default(),
            trainer: TrainerSettings::default(),
            race: RaceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Check the values the physics relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rider
            .physics_config()
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if !RiderSettings::validate_ftp(self.rider.ftp) {
            return Err(ConfigError::InvalidValue(
                "FTP must be between 50 and 600 watts".to_string(),
            ));
        }

        if !(MIN_TICK_HZ..=MAX_TICK_HZ).contains(&self.race.tick_hz) {
            return Err(ConfigError::InvalidValue(format!(
                "tick_hz must be between {} and {}, got {}",
                MIN_TICK_HZ, MAX_TICK_HZ, self.race.tick_hz
            )));
        }

        if self.trainer.synthetic_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "synthetic_interval_ms must be positive".to_string(),
            ));
        }

        if let PowerHoldPolicy::DecayAfter { timeout_s } = self.race.power_hold {
            if !(timeout_s.is_finite() && timeout_s >= 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "power hold timeout must be non-negative, got {}",
                    timeout_s
                )));
            }
        }

        Ok(())
    }
}

/// Rider physical profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderSettings {
    /// Body mass in kg
    pub weight_kg: f64,
    /// Bike mass in kg
    pub bike_mass_kg: f64,
    /// Drag area in m²
    pub cda: f64,
    /// Air density in kg/m³
    pub rho_air: f64,
    /// Functional Threshold Power in watts
    pub ftp: u16,
}

impl Default for RiderSettings {
    fn default() -> Self {
        Self {
            weight_kg: 75.0,
            bike_mass_kg: BIKE_MASS,
            cda: DEFAULT_CDA,
            rho_air: AIR_DENSITY,
            ftp: 200,
        }
    }
}

impl RiderSettings {
    /// Validate FTP value
    pub fn validate_ftp(ftp: u16) -> bool {
        (50..=600).contains(&ftp)
    }

    /// Physics profile for the rider plus bike. Rolling resistance starts
    /// at the asphalt value and follows the course surface once racing.
    pub fn physics_config(&self) -> PhysicsConfig {
        PhysicsConfig {
            mass_kg: self.weight_kg + self.bike_mass_kg,
            cda: self.cda,
            crr: DEFAULT_CRR,
            rho_air: self.rho_air,
            grade: 0.0,
        }
    }
}

/// Which trainer implementation to ride on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerBackend {
    #[default]
    Synthetic,
    Hardware,
}

impl std::fmt::Display for TrainerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainerBackend::Synthetic => write!(f, "synthetic"),
            TrainerBackend::Hardware => write!(f, "hardware"),
        }
    }
}

/// Trainer-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub backend: TrainerBackend,
    /// Synthetic frame period in milliseconds
    pub synthetic_interval_ms: u64,
    pub synthetic_power_w: i16,
    pub synthetic_cadence_rpm: f64,
    /// Discovery timeout in seconds
    pub scan_timeout_secs: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u32,
    /// Wait for the control grant in seconds
    pub control_grant_timeout_secs: u32,
    /// Raw exchanges kept for the debug log
    pub debug_log_capacity: usize,
    /// Only connect to devices whose name contains this
    pub device_name_filter: Option<String>,
    /// Also connect a heart rate strap
    pub heart_rate: bool,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            backend: TrainerBackend::Synthetic,
            synthetic_interval_ms: 1000,
            synthetic_power_w: 200,
            synthetic_cadence_rpm: 90.0,
            scan_timeout_secs: 30,
            connection_timeout_secs: 10,
            control_grant_timeout_secs: 5,
            debug_log_capacity: 64,
            device_name_filter: None,
            heart_rate: false,
        }
    }
}

impl TrainerSettings {
    pub fn synthetic_interval(&self) -> Duration {
        Duration::from_millis(self.synthetic_interval_ms)
    }

    pub fn synthetic_values(&self) -> SyntheticValues {
        SyntheticValues {
            power_w: Some(self.synthetic_power_w),
            speed_kmh: None,
            cadence_rpm: Some(self.synthetic_cadence_rpm),
        }
    }

    pub fn transport_config(&self) -> BtleTransportConfig {
        BtleTransportConfig {
            scan_timeout: Duration::from_secs(self.scan_timeout_secs.into()),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs.into()),
            name_filter: self.device_name_filter.clone(),
        }
    }

    pub fn hardware_config(&self) -> HardwareTrainerConfig {
        HardwareTrainerConfig {
            control_grant_timeout: Duration::from_secs(self.control_grant_timeout_secs.into()),
            debug_log_capacity: self.debug_log_capacity,
        }
    }
}

/// Slowest accepted simulation rate in ticks per second.
pub const MIN_TICK_HZ: f64 = 1.0;

/// Fastest accepted simulation rate in ticks per second.
pub const MAX_TICK_HZ: f64 = 1000.0;

const DEFAULT_TICK_HZ: f64 = 10.0;

/// Race-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    pub ghost_count: usize,
    pub difficulty: GhostDifficulty,
    /// Roster seed; the same seed gives the same field
    pub seed: u64,
    /// Simulation ticks per second
    pub tick_hz: f64,
    pub power_hold: PowerHoldPolicy,
    pub resistance: ResistanceThresholds,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            ghost_count: 4,
            difficulty: GhostDifficulty::default(),
            seed: 1,
            tick_hz: DEFAULT_TICK_HZ,
            power_hold: PowerHoldPolicy::default(),
            resistance: ResistanceThresholds::default(),
        }
    }
}

impl RaceSettings {
    /// Tick period, with the rate clamped to the accepted range.
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.tick_hz.is_nan() {
            DEFAULT_TICK_HZ
        } else {
            self.tick_hz.clamp(MIN_TICK_HZ, MAX_TICK_HZ)
        };
        Duration::from_secs_f64(1.0 / hz)
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ghostride", "GhostRide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();
    config.validate()?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = get_config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
