//! Notification handlers run inside each device's polling task.
//!
//! Handlers own everything they mutate. What the display needs is published
//! through `watch` channels, so the display task never borrows handler state.
//! Points are queued for the writer task and never written inline.

use chrono::Utc;
use tokio::sync::watch;

use crate::metrics::zones::{HeartZone, HeartZones, PowerZone, PowerZones};
use crate::recording::point::DataPoint;
use crate::recording::writer::PointQueue;
use crate::sensors::device::NotificationHandler;
use crate::sensors::types::{BikeReading, HeartRateReading, Metrics};
use crate::storage::training::TrainingStore;

/// Samples recorded per cadence at the active resistance.
pub type Coverage = Vec<(u16, usize)>;

/// Latest bike state published to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BikeStatus {
    pub reading: BikeReading,
    pub resistance: u8,
    pub power_zone: PowerZone,
}

impl Default for BikeStatus {
    fn default() -> Self {
        Self {
            reading: BikeReading::default(),
            resistance: 0,
            power_zone: PowerZone::NoZone,
        }
    }
}

/// Latest heart rate state published to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartStatus {
    pub reading: HeartRateReading,
    pub zone: HeartZone,
}

impl Default for HeartStatus {
    fn default() -> Self {
        Self {
            reading: HeartRateReading::default(),
            zone: HeartZone::NoZone,
        }
    }
}

/// Where the bike's resistance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResistanceSource {
    /// Predicted from the training store on every update
    Predicted,
    /// Fixed for a training session; samples are recorded under it
    Training(u8),
}

/// Handles indoor bike notifications.
pub struct BikeHandler<'a> {
    zones: &'a PowerZones,
    store: &'a mut TrainingStore,
    points: PointQueue,
    source: ResistanceSource,
    resistance: u8,
    status: watch::Sender<BikeStatus>,
    coverage: watch::Sender<Coverage>,
}

impl<'a> BikeHandler<'a> {
    pub fn new(
        zones: &'a PowerZones,
        store: &'a mut TrainingStore,
        points: PointQueue,
        source: ResistanceSource,
        status: watch::Sender<BikeStatus>,
        coverage: watch::Sender<Coverage>,
    ) -> Self {
        let resistance = match source {
            ResistanceSource::Training(resistance) => {
                coverage.send_replace(store.cadence_counts(resistance));
                resistance
            }
            ResistanceSource::Predicted => 0,
        };

        Self {
            zones,
            store,
            points,
            source,
            resistance,
            status,
            coverage,
        }
    }

    fn on_bike(&mut self, reading: BikeReading) {
        let power = f64::from(reading.power_watts);
        let zone = self.zones.classify_value(power);

        match self.source {
            ResistanceSource::Training(resistance) => {
                self.resistance = resistance;
                if self
                    .store
                    .record(resistance, reading.cadence_rpm, power, reading.speed_mph)
                {
                    self.coverage
                        .send_replace(self.store.cadence_counts(resistance));
                }
            }
            ResistanceSource::Predicted => {
                // Keep the last prediction while the store has nothing to offer
                if let Some(predicted) =
                    self.store
                        .predict_resistance(reading.cadence_rpm, power, reading.speed_mph)
                {
                    self.resistance = predicted;
                }

                self.points
                    .push(DataPoint::indoor_bike_data(&reading, zone, Utc::now()));
            }
        }

        self.status.send_replace(BikeStatus {
            reading,
            resistance: self.resistance,
            power_zone: zone,
        });
    }
}

impl NotificationHandler for BikeHandler<'_> {
    async fn on_metrics(&mut self, metrics: Metrics) {
        match metrics {
            Metrics::Bike(reading) => self.on_bike(reading),
            other => tracing::debug!("Bike handler ignoring {:?}", other),
        }
    }
}

/// Handles heart rate notifications.
pub struct HeartHandler<'a> {
    zones: &'a HeartZones,
    points: PointQueue,
    /// Queue points for the writer; off during training
    record: bool,
    status: watch::Sender<HeartStatus>,
}

impl<'a> HeartHandler<'a> {
    pub fn new(
        zones: &'a HeartZones,
        points: PointQueue,
        record: bool,
        status: watch::Sender<HeartStatus>,
    ) -> Self {
        Self {
            zones,
            points,
            record,
            status,
        }
    }

    fn on_heart_rate(&mut self, reading: HeartRateReading) {
        let zone = self.zones.classify_value(f64::from(reading.heart_rate_bpm));

        if self.record {
            self.points
                .push(DataPoint::heart_rate_monitor(&reading, zone, Utc::now()));
        }

        self.status.send_replace(HeartStatus { reading, zone });
    }
}

impl NotificationHandler for HeartHandler<'_> {
    async fn on_metrics(&mut self, metrics: Metrics) {
        match metrics {
            Metrics::HeartRate(reading) => self.on_heart_rate(reading),
            other => tracing::debug!("Heart rate handler ignoring {:?}", other),
        }
    }
}
