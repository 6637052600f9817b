//! Mock collaborators for session tests: a scripted BLE transport, an
//! in-memory point sink and a dashboard that keeps every frame.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use spinzone::recording::{DataPoint, PointSink, SinkError};
use spinzone::sensors::ftms::encode_indoor_bike_data;
use spinzone::sensors::{BleTransport, NotificationStream, SensorError};
use spinzone::ui::{Dashboard, DashboardSnapshot};
use uuid::Uuid;

/// Mock sensor data generator for testing.
pub struct MockSensorData {
    /// Current power value
    pub power: i16,
    /// Current cadence (0.5 RPM resolution)
    pub cadence: i16,
    /// Current speed (in 0.01 km/h)
    pub speed: i16,
    /// Current heart rate
    pub heart_rate: u8,
}

impl Default for MockSensorData {
    fn default() -> Self {
        Self {
            power: 200,
            cadence: 180, // 90 RPM
            speed: 3000,  // 30.0 km/h
            heart_rate: 145,
        }
    }
}

impl MockSensorData {
    /// Generate an Indoor Bike Data packet.
    pub fn indoor_bike_data(&self) -> Vec<u8> {
        encode_indoor_bike_data(self.speed, self.cadence, self.power)
    }

    /// Generate a heart rate packet.
    pub fn heart_rate(&self) -> Vec<u8> {
        vec![self.heart_rate]
    }
}

/// Scripted behavior of one peripheral.
#[derive(Clone)]
pub struct MockPeripheral {
    pub address: String,
    /// Discovery attempts that find nothing before the device shows up
    pub misses: u32,
    /// Never show up
    pub hidden: bool,
    /// Virtual time one discovery call takes
    pub scan_time: Duration,
    pub fail_connect: bool,
    /// Notification payloads, one per `interval`
    pub payloads: Vec<Vec<u8>>,
    pub interval: Duration,
    /// Keep the link open after the payloads run out
    pub hold_open: bool,
}

impl MockPeripheral {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            misses: 0,
            hidden: false,
            scan_time: Duration::ZERO,
            fail_connect: false,
            payloads: Vec::new(),
            interval: Duration::from_secs(1),
            hold_open: true,
        }
    }

    pub fn with_payloads(mut self, payloads: Vec<Vec<u8>>) -> Self {
        self.payloads = payloads;
        self
    }
}

/// BLE transport serving scripted peripherals by advertised name.
#[derive(Default)]
pub struct MockBle {
    peripherals: HashMap<String, MockPeripheral>,
    discover_calls: Mutex<HashMap<String, u32>>,
    /// Addresses connected, in order
    pub connected: Mutex<Vec<String>>,
    /// Addresses unsubscribed, in order
    pub unsubscribed: Mutex<Vec<String>>,
    /// Addresses disconnected, in order
    pub disconnected: Mutex<Vec<String>>,
}

impl MockBle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: &str, peripheral: MockPeripheral) -> Self {
        self.peripherals.insert(name.to_string(), peripheral);
        self
    }

    pub fn discover_calls(&self, name: &str) -> u32 {
        self.discover_calls
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn by_address(&self, address: &str) -> Option<&MockPeripheral> {
        self.peripherals.values().find(|p| p.address == address)
    }
}

impl BleTransport for MockBle {
    type Link = String;

    async fn discover(&self, name: &str, _timeout: Duration) -> Result<Option<String>, SensorError> {
        let call = {
            let mut calls = self.discover_calls.lock().unwrap();
            let count = calls.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let Some(peripheral) = self.peripherals.get(name) else {
            return Ok(None);
        };
        tokio::time::sleep(peripheral.scan_time).await;

        if peripheral.hidden || call <= peripheral.misses {
            Ok(None)
        } else {
            Ok(Some(peripheral.address.clone()))
        }
    }

    async fn connect(&self, address: &str) -> Result<String, SensorError> {
        let peripheral = self
            .by_address(address)
            .ok_or_else(|| SensorError::ConnectionFailed(format!("unknown address {address}")))?;
        if peripheral.fail_connect {
            return Err(SensorError::ConnectionFailed("link refused".to_string()));
        }
        self.connected.lock().unwrap().push(address.to_string());
        Ok(address.to_string())
    }

    async fn subscribe(
        &self,
        link: &String,
        _characteristic: Uuid,
    ) -> Result<NotificationStream, SensorError> {
        let peripheral = self
            .by_address(link)
            .ok_or_else(|| SensorError::SubscriptionFailed(link.clone()))?;
        let interval = peripheral.interval;

        let payloads = stream::iter(peripheral.payloads.clone()).then(move |payload| async move {
            tokio::time::sleep(interval).await;
            payload
        });

        if peripheral.hold_open {
            Ok(payloads.chain(stream::pending()).boxed())
        } else {
            Ok(payloads.boxed())
        }
    }

    async fn unsubscribe(&self, link: &String, _characteristic: Uuid) -> Result<(), SensorError> {
        self.unsubscribed.lock().unwrap().push(link.clone());
        Ok(())
    }

    async fn disconnect(&self, link: String) -> Result<(), SensorError> {
        self.disconnected.lock().unwrap().push(link);
        Ok(())
    }
}

/// Sink keeping every written point.
#[derive(Default)]
pub struct MemorySink {
    pub points: Mutex<Vec<DataPoint>>,
}

impl MemorySink {
    pub fn measurements(&self, measurement: &str) -> Vec<DataPoint> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.measurement == measurement)
            .cloned()
            .collect()
    }
}

impl PointSink for MemorySink {
    async fn write_point(&self, point: &DataPoint) -> Result<(), SinkError> {
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }
}

/// Sink that takes `delay` for every write and then fails.
pub struct SlowSink {
    pub delay: Duration,
    pub attempts: Mutex<usize>,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            attempts: Mutex::new(0),
        }
    }
}

impl PointSink for SlowSink {
    async fn write_point(&self, _point: &DataPoint) -> Result<(), SinkError> {
        *self.attempts.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        Err(SinkError::Http("request timed out".to_string()))
    }
}

/// Dashboard keeping every frame.
#[derive(Default)]
pub struct RecordingDashboard {
    pub frames: Vec<DashboardSnapshot>,
    pub closed: bool,
}

impl Dashboard for RecordingDashboard {
    fn render(&mut self, snapshot: &DashboardSnapshot) -> std::io::Result<()> {
        self.frames.push(snapshot.clone());
        Ok(())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[test]
fn test_mock_payloads_decode() {
    let mock = MockSensorData::default();

    let bike = spinzone::sensors::ftms::decode_indoor_bike_data(&mock.indoor_bike_data()).unwrap();
    let heart = spinzone::sensors::ftms::decode_heart_rate(&mock.heart_rate()).unwrap();

    assert_eq!(bike.cadence_rpm, 90);
    assert_eq!(bike.power_watts, 200);
    assert_eq!(heart.heart_rate_bpm, 145);
}
