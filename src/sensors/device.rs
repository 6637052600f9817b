//! One BLE device: address resolution, decoding and the polling loop.
//!
//! A device moves `Inactive -> Connecting -> Active -> Inactive` through its own
//! key in the [`SessionState`]. The session registers the key as `Connecting`
//! before discovery; `poll` promotes it to `Active` once subscribed and leaves
//! as soon as it reads anything other than `Active`.

use std::future::Future;
use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::time::MissedTickBehavior;

use crate::sensors::ftms::{decode_heart_rate, decode_indoor_bike_data};
use crate::sensors::transport::{BleTransport, NotificationStream};
use crate::sensors::types::{DecodeError, Metrics, SensorConfig, SensorError, SensorKind};
use crate::session::state::{LoopStatus, SessionState, TaskId};

/// Receives every successfully decoded notification of a device.
pub trait NotificationHandler {
    fn on_metrics(&mut self, metrics: Metrics) -> impl Future<Output = ()>;
}

/// A named BLE device and its latest decoded metrics.
pub struct Device<T: BleTransport> {
    /// Advertised name searched for during discovery
    name: String,
    kind: SensorKind,
    /// Key of this device's flag in the session state
    task: TaskId,
    /// Resolved address, empty until discovery succeeds
    address: String,
    latest: Option<Metrics>,
    transport: Arc<T>,
    state: SessionState,
    config: SensorConfig,
}

impl<T: BleTransport> Device<T> {
    /// Create a device with no resolved address.
    pub fn new(
        name: impl Into<String>,
        kind: SensorKind,
        task: TaskId,
        transport: Arc<T>,
        state: SessionState,
        config: SensorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            task,
            address: String::new(),
            latest: None,
            transport,
            state,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Resolved BLE address, empty if discovery has not succeeded yet.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Most recent successfully decoded metrics.
    pub fn latest(&self) -> Option<Metrics> {
        self.latest
    }

    /// This device's lifecycle flag.
    pub fn status(&self) -> LoopStatus {
        self.state.status(self.task)
    }

    /// Decode a raw payload without touching device state.
    pub fn decode(&self, raw: &[u8]) -> Result<Metrics, DecodeError> {
        match self.kind {
            SensorKind::Bike => decode_indoor_bike_data(raw).map(Metrics::Bike),
            SensorKind::HeartRateMonitor => decode_heart_rate(raw).map(Metrics::HeartRate),
        }
    }

    /// Decode a payload and keep it as the latest metrics.
    ///
    /// A malformed payload leaves the previous metrics untouched.
    pub fn update(&mut self, raw: &[u8]) -> Result<Metrics, DecodeError> {
        let metrics = self.decode(raw)?;
        self.latest = Some(metrics);
        Ok(metrics)
    }

    /// Resolve the device's address by name.
    ///
    /// Makes up to `discovery_attempts` discovery calls. Scanning again with an
    /// address already present is allowed so a lost link can be re-resolved;
    /// the old address is kept if nothing is found.
    pub async fn scan_for_device(&mut self) -> Result<String, SensorError> {
        if !self.address.is_empty() {
            tracing::warn!(
                "Scanning for device, but address already present: {}",
                self.address
            );
        }

        tracing::info!("Scanning for BLE device by name: {}", self.name);

        let attempts = self.config.discovery_attempts;
        for attempt in 1..=attempts {
            if self.status() == LoopStatus::Inactive {
                return Err(SensorError::Cancelled(self.name.clone()));
            }

            match self
                .transport
                .discover(&self.name, self.config.discovery_timeout)
                .await
            {
                Ok(Some(address)) => {
                    tracing::debug!(
                        "Setting device ({}) to BLE address ({})",
                        self.name,
                        address
                    );
                    self.address = address.clone();
                    return Ok(address);
                }
                Ok(None) => {
                    tracing::warn!(
                        "Unable to find device ({}), attempt {}/{}",
                        self.name,
                        attempt,
                        attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Scan for device ({}) failed, attempt {}/{}: {}",
                        self.name,
                        attempt,
                        attempts,
                        e
                    );
                    // The scan returned early; wait out a discovery window before retrying
                    if attempt < attempts {
                        tokio::time::sleep(self.config.discovery_timeout).await;
                    }
                }
            }
        }

        // A stop during the last attempt is still a cancellation
        if self.status() == LoopStatus::Inactive {
            return Err(SensorError::Cancelled(self.name.clone()));
        }

        Err(SensorError::DeviceNotFound {
            name: self.name.clone(),
            attempts,
        })
    }

    /// Connect, subscribe and feed every notification to `handler` until stopped.
    ///
    /// Returns `Ok` on a cooperative stop or when the link drops; connection and
    /// subscription failures mark the flag inactive and are returned.
    pub async fn poll<H: NotificationHandler>(&mut self, handler: &mut H) -> Result<(), SensorError> {
        if self.address.is_empty() {
            return Err(SensorError::AddressUnresolved(self.name.clone()));
        }

        if self.status() != LoopStatus::Connecting {
            tracing::debug!("Not polling {}: session is stopping", self.name);
            return Ok(());
        }

        let link = match self.transport.connect(&self.address).await {
            Ok(link) => link,
            Err(e) => {
                self.state.set(self.task, LoopStatus::Inactive);
                return Err(e);
            }
        };

        let characteristic = self.kind.characteristic();
        let mut notifications = match self.transport.subscribe(&link, characteristic).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state.set(self.task, LoopStatus::Inactive);
                self.release(link, false).await;
                return Err(e);
            }
        };

        if self
            .state
            .transition(self.task, LoopStatus::Connecting, LoopStatus::Active)
        {
            tracing::info!("Polling {} ({}) at {}", self.name, self.kind, self.address);
            self.listen(&mut notifications, handler).await;
        } else {
            tracing::debug!("Session stopped while connecting to {}", self.name);
        }

        drop(notifications);
        self.release(link, true).await;

        tracing::info!("Stopped polling {}", self.name);
        Ok(())
    }

    async fn listen<H: NotificationHandler>(
        &mut self,
        notifications: &mut NotificationStream,
        handler: &mut H,
    ) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state.is_active(self.task) {
            tokio::select! {
                payload = notifications.next() => match payload {
                    Some(payload) => self.dispatch(&payload, handler).await,
                    None => {
                        tracing::warn!("Notification stream from {} ended", self.name);
                        self.state.set(self.task, LoopStatus::Inactive);
                    }
                },
                _ = ticker.tick() => {}
            }
        }
    }

    async fn dispatch<H: NotificationHandler>(&mut self, payload: &[u8], handler: &mut H) {
        match self.update(payload) {
            Ok(metrics) => handler.on_metrics(metrics).await,
            Err(e) => tracing::warn!("Skipping notification from {}: {}", self.name, e),
        }
    }

    async fn release(&self, link: T::Link, subscribed: bool) {
        if subscribed {
            if let Err(e) = self
                .transport
                .unsubscribe(&link, self.kind.characteristic())
                .await
            {
                tracing::warn!("Failed to unsubscribe from {}: {}", self.name, e);
            }
        }

        if let Err(e) = self.transport.disconnect(link).await {
            tracing::warn!("Failed to disconnect from {}: {}", self.name, e);
        }
    }
}
