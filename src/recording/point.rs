//! Time-series data points and their InfluxDB line protocol form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::zones::{HeartZone, PowerZone, Zone};
use crate::sensors::types::{BikeReading, HeartRateReading};

/// Measurement written for every bike notification.
pub const BIKE_MEASUREMENT: &str = "indoor_bike_data";

/// Measurement written for every heart rate notification.
pub const HEART_RATE_MEASUREMENT: &str = "heart_rate_monitor";

/// Timestamp format used when a point is shown to people.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}i", v),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

/// One measurement at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl DataPoint {
    /// Create a point with no tags or fields.
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// `indoor_bike_data` point for one bike reading.
    pub fn indoor_bike_data(
        reading: &BikeReading,
        zone: PowerZone,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(BIKE_MEASUREMENT, timestamp)
            .field("speed", reading.speed_mph)
            .field("cadence", i64::from(reading.cadence_rpm))
            .field("power", i64::from(reading.power_watts))
            .field("power_zone", i64::from(zone.value()))
    }

    /// `heart_rate_monitor` point for one heart rate reading.
    pub fn heart_rate_monitor(
        reading: &HeartRateReading,
        zone: HeartZone,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(HEART_RATE_MEASUREMENT, timestamp)
            .field("heart_rate", i64::from(reading.heart_rate_bpm))
            .field("zone", i64::from(zone.value()))
    }

    /// Timestamp as ISO-8601 UTC with second precision.
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Line protocol with a timestamp in epoch seconds.
    ///
    /// A point without fields is not valid line protocol; callers should
    /// not write one.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value))
            .collect();

        line.push(' ');
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&self.timestamp.timestamp().to_string());
        line
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
