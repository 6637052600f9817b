//! BLE transport: discovery, links and characteristic notifications.
//!
//! [`BleTransport`] is the narrow surface devices need from a BLE stack.
//! [`BtleplugTransport`] implements it on top of `btleplug`.

use std::future::Future;
use std::time::Duration;

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{BoxStream, StreamExt};
use uuid::Uuid;

use crate::sensors::types::SensorError;

/// Stream of raw notification payloads for one characteristic.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// BLE operations used by a device.
pub trait BleTransport: Send + Sync {
    /// An open connection to one peripheral
    type Link: Send + Sync;

    /// Scan for `timeout` and return the address of the device advertising `name`.
    fn discover(
        &self,
        name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<String>, SensorError>> + Send;

    /// Open a link to a previously discovered address.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Link, SensorError>> + Send;

    /// Enable notifications on a characteristic and stream their payloads.
    fn subscribe(
        &self,
        link: &Self::Link,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<NotificationStream, SensorError>> + Send;

    /// Disable notifications on a characteristic.
    fn unsubscribe(
        &self,
        link: &Self::Link,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<(), SensorError>> + Send;

    /// Release the link.
    fn disconnect(&self, link: Self::Link)
        -> impl Future<Output = Result<(), SensorError>> + Send;
}

/// `btleplug` backed transport using the first system adapter.
pub struct BtleplugTransport {
    adapter: Adapter,
}

impl BtleplugTransport {
    /// Initialize the BLE adapter.
    pub async fn new() -> Result<Self, SensorError> {
        tracing::info!("Initializing BLE adapter");

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        tracing::info!("BLE adapter initialized");
        Ok(Self { adapter })
    }

    /// Find a known peripheral by its address.
    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, SensorError> {
        self.adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.id().to_string() == address)
            .ok_or_else(|| SensorError::ConnectionFailed(format!("unknown address {address}")))
    }

    fn find_characteristic(
        link: &Peripheral,
        characteristic: Uuid,
    ) -> Result<Characteristic, SensorError> {
        link.characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic)
            .ok_or(SensorError::CharacteristicNotFound(characteristic))
    }
}

impl BleTransport for BtleplugTransport {
    type Link = Peripheral;

    async fn discover(&self, name: &str, timeout: Duration) -> Result<Option<String>, SensorError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

        tokio::time::sleep(timeout).await;

        let peripherals = self.adapter.peripherals().await;

        if let Err(e) = self.adapter.stop_scan().await {
            tracing::debug!("Failed to stop scan: {}", e);
        }

        for peripheral in peripherals? {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };

            if properties.local_name.as_deref() == Some(name) {
                let address = peripheral.id().to_string();
                tracing::info!("Found device ({}) at address ({})", name, address);
                return Ok(Some(address));
            }
        }

        Ok(None)
    }

    async fn connect(&self, address: &str) -> Result<Peripheral, SensorError> {
        let peripheral = self.find_peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(
            "Device ({}) connected: {}",
            address,
            peripheral.is_connected().await.unwrap_or(false)
        );

        Ok(peripheral)
    }

    async fn subscribe(
        &self,
        link: &Peripheral,
        characteristic: Uuid,
    ) -> Result<NotificationStream, SensorError> {
        let target = Self::find_characteristic(link, characteristic)?;

        // Open the stream first so no notification slips between the two calls
        let notifications = link.notifications().await?;

        link.subscribe(&target)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        tracing::debug!("Subscribed to characteristic: {}", characteristic);

        Ok(notifications
            .filter_map(move |n| async move { (n.uuid == characteristic).then_some(n.value) })
            .boxed())
    }

    async fn unsubscribe(&self, link: &Peripheral, characteristic: Uuid) -> Result<(), SensorError> {
        let target = Self::find_characteristic(link, characteristic)?;

        link.unsubscribe(&target)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))
    }

    async fn disconnect(&self, link: Peripheral) -> Result<(), SensorError> {
        link.disconnect().await?;
        Ok(())
    }
}
