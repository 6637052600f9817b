//! Sensor types and errors for the BLE bike and heart rate monitor.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::sensors::ftms::{HEART_RATE_MEASUREMENT_UUID, INDOOR_BIKE_DATA_UUID};

/// Kind of device a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Indoor bike broadcasting Indoor Bike Data
    Bike,
    /// Heart rate monitor
    HeartRateMonitor,
}

impl SensorKind {
    /// Characteristic the device's metrics are notified on.
    pub fn characteristic(&self) -> Uuid {
        match self {
            SensorKind::Bike => INDOOR_BIKE_DATA_UUID,
            SensorKind::HeartRateMonitor => HEART_RATE_MEASUREMENT_UUID,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Bike => write!(f, "Bike"),
            SensorKind::HeartRateMonitor => write!(f, "HRM"),
        }
    }
}

/// Physical bike metrics decoded from one notification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BikeReading {
    /// Instantaneous speed in mph
    pub speed_mph: f64,
    /// Instantaneous cadence in RPM
    pub cadence_rpm: u16,
    /// Instantaneous power in watts
    pub power_watts: i16,
}

/// Heart rate decoded from one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartRateReading {
    /// Heart rate in BPM
    pub heart_rate_bpm: u32,
}

/// Decoded metrics of either device kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metrics {
    Bike(BikeReading),
    HeartRate(HeartRateReading),
}

/// Timing of discovery and polling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    /// How long one discovery attempt scans for
    pub discovery_timeout: Duration,
    /// Total discovery attempts before giving up
    pub discovery_attempts: u32,
    /// How often an idle poll loop rechecks its lifecycle flag
    pub poll_interval: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(5),
            discovery_attempts: 5,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Malformed notification payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload shorter than the fixed layout
    #[error("Payload too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Payload longer than the value it encodes can hold
    #[error("Payload too long: expected at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Errors that can occur in the sensor system.
#[derive(Debug, Error)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Failed to start or finish a BLE scan
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// Discovery gave up after the retry budget
    #[error("Unable to find device '{name}' after {attempts} attempts")]
    DeviceNotFound { name: String, attempts: u32 },

    /// Poll requested before the address was resolved
    #[error("No BLE address resolved for device '{0}'")]
    AddressUnresolved(String),

    /// Connection to the device failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The device does not expose the expected characteristic
    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Failed to subscribe to or unsubscribe from notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// The session stopped while the operation was in progress
    #[error("Cancelled while connecting to '{0}'")]
    Cancelled(String),

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}

impl From<btleplug::Error> for SensorError {
    fn from(err: btleplug::Error) -> Self {
        SensorError::BleError(err.to_string())
    }
}
