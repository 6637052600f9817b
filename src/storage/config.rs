//! User profile, device names and application settings.
//!
//! Device names and the user profile are flat JSON documents that must exist
//! before a session starts. Application settings live in an optional TOML
//! file; a missing file yields defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::metrics::zones::{HeartZones, PowerZones, ZoneError, AGE_RANGE};
use crate::sensors::types::SensorConfig;

/// BLE names searched for when resolving devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNames {
    /// Advertised name of the indoor bike
    pub bike: String,
    /// Advertised name of the heart rate monitor
    pub hrm: String,
}

impl DeviceNames {
    /// Reject empty names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bike.trim().is_empty() {
            return Err(ConfigError::Invalid("bike name is empty".to_string()));
        }
        if self.hrm.trim().is_empty() {
            return Err(ConfigError::Invalid("hrm name is empty".to_string()));
        }
        Ok(())
    }
}

/// Rider profile used to personalize zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Functional Threshold Power in watts
    pub ftp: u32,
}

impl UserProfile {
    /// Reject values the zone tables cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !AGE_RANGE.contains(&self.age) {
            return Err(ConfigError::Invalid(format!(
                "age must be between {} and {}, got {}",
                AGE_RANGE.start(),
                AGE_RANGE.end(),
                self.age
            )));
        }
        if self.ftp == 0 {
            return Err(ConfigError::Invalid("FTP must be positive".to_string()));
        }
        Ok(())
    }

    /// Heart rate zones from age.
    pub fn heart_zones(&self) -> Result<HeartZones, ZoneError> {
        HeartZones::from_age(self.age)
    }

    /// Power zones from FTP.
    pub fn power_zones(&self) -> Result<PowerZones, ZoneError> {
        PowerZones::from_ftp(self.ftp)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sensor settings
    pub sensors: SensorSettings,
    /// Display settings
    pub display: DisplaySettings,
    /// InfluxDB settings
    pub influx: InfluxSettings,
}

/// Sensor-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Length of one discovery scan in seconds
    pub discovery_timeout_secs: u64,
    /// Discovery attempts before a device counts as missing
    pub discovery_attempts: u32,
    /// Idle recheck interval of the polling loop in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 5,
            discovery_attempts: 5,
            poll_interval_ms: 1000,
        }
    }
}

impl From<&SensorSettings> for SensorConfig {
    fn from(settings: &SensorSettings) -> Self {
        Self {
            discovery_timeout: Duration::from_secs(settings.discovery_timeout_secs),
            discovery_attempts: settings.discovery_attempts.max(1),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
        }
    }
}

/// Display-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Dashboard redraw interval in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 400,
        }
    }
}

/// InfluxDB connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxSettings {
    /// Write points to InfluxDB
    pub enabled: bool,
    /// Base URL of the InfluxDB HTTP API
    pub url: String,
    /// Database name
    pub database: String,
    pub username: String,
    pub password: String,
    /// Per-write timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8086".to_string(),
            database: "piloton".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
            timeout_secs: 2,
        }
    }
}

/// Locations of the data files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    dir: PathBuf,
}

impl DataPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn devices(&self) -> PathBuf {
        self.dir.join("devices.json")
    }

    pub fn users(&self) -> PathBuf {
        self.dir.join("users.json")
    }

    pub fn training(&self) -> PathBuf {
        self.dir.join("training.json")
    }

    pub fn settings(&self) -> PathBuf {
        self.dir.join("settings.toml")
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(get_data_dir())
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "spinzone", "SpinZone")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn read_required(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))
}

/// Load and validate device names.
pub fn load_devices(paths: &DataPaths) -> Result<DeviceNames, ConfigError> {
    let path = paths.devices();
    let content = read_required(&path)?;
    let devices: DeviceNames = serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
    devices.validate()?;
    Ok(devices)
}

/// Load and validate the user profile.
pub fn load_user(paths: &DataPaths) -> Result<UserProfile, ConfigError> {
    let path = paths.users();
    let content = read_required(&path)?;
    let user: UserProfile = serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
    user.validate()?;
    Ok(user)
}

/// Load application configuration, falling back to defaults if absent.
pub fn load_config(paths: &DataPaths) -> Result<AppConfig, ConfigError> {
    let path = paths.settings();

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Set one field of a flat JSON document, creating the document if needed.
pub fn update_document(
    path: &Path,
    key: &str,
    value: serde_json::Value,
) -> Result<(), ConfigError> {
    let mut document = if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?
    } else {
        serde_json::Map::new()
    };

    document.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content = serde_json::to_string_pretty(&document)
        .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file: {}", .0.display())]
    Missing(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
