//! Point sinks: InfluxDB over HTTP, or nowhere.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::recording::point::DataPoint;
use crate::storage::config::InfluxSettings;

/// Destination for recorded data points.
pub trait PointSink: Send + Sync {
    /// Write one point. A failed write is not retried.
    fn write_point(&self, point: &DataPoint) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Errors returned by a sink write.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("InfluxDB rejected write with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Point {0} has no fields")]
    NoFields(String),
}

/// Writes points to an InfluxDB 1.x `/write` endpoint.
pub struct InfluxSink {
    http: reqwest::Client,
    /// Full write endpoint, query string excluded
    write_url: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxSink {
    /// Create a sink from connection settings.
    pub fn new(settings: &InfluxSettings) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| SinkError::Client(e.to_string()))?;

        Ok(Self {
            http,
            write_url: format!("{}/write", settings.url.trim_end_matches('/')),
            database: settings.database.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

impl PointSink for InfluxSink {
    async fn write_point(&self, point: &DataPoint) -> Result<(), SinkError> {
        if point.fields.is_empty() {
            return Err(SinkError::NoFields(point.measurement.clone()));
        }

        let response = self
            .http
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .basic_auth(&self.username, Some(&self.password))
            .body(point.to_line_protocol())
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::trace!("Wrote {} at {}", point.measurement, point.iso_timestamp());
        Ok(())
    }
}

/// Drops every point.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl PointSink for DiscardSink {
    async fn write_point(&self, _point: &DataPoint) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink chosen from configuration at startup.
pub enum RecordingSink {
    Influx(InfluxSink),
    Disabled(DiscardSink),
}

impl RecordingSink {
    /// InfluxDB when enabled, otherwise a discarding sink.
    pub fn from_settings(settings: &InfluxSettings) -> Result<Self, SinkError> {
        if settings.enabled {
            tracing::info!("Recording to InfluxDB at {} ({})", settings.url, settings.database);
            Ok(RecordingSink::Influx(InfluxSink::new(settings)?))
        } else {
            tracing::info!("InfluxDB recording disabled");
            Ok(RecordingSink::Disabled(DiscardSink))
        }
    }
}

impl PointSink for RecordingSink {
    async fn write_point(&self, point: &DataPoint) -> Result<(), SinkError> {
        match self {
            RecordingSink::Influx(sink) => sink.write_point(point).await,
            RecordingSink::Disabled(sink) => sink.write_point(point).await,
        }
    }
}
