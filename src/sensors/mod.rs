//! Sensor module for the BLE indoor bike and heart rate monitor.

pub mod device;
pub mod ftms;
pub mod transport;
pub mod types;

pub use device::{Device, NotificationHandler};
pub use transport::{BleTransport, BtleplugTransport, NotificationStream};
pub use types::{
    BikeReading, DecodeError, HeartRateReading, Metrics, SensorConfig, SensorError, SensorKind,
};
