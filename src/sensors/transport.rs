//! GATT transport abstraction and the btleplug-backed implementation.
//!
//! Channels talk to a [`GattTransport`] rather than to btleplug directly so
//! the handshake and gating logic can be exercised against a mock.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::sensors::types::{ConnectionError, TrainerError};

/// A notification or indication received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattNotification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// Stream of notifications for every subscribed characteristic.
pub type NotificationStream = Pin<Box<dyn Stream<Item = GattNotification> + Send>>;

/// The slice of a GATT client the channels need.
#[async_trait]
pub trait GattTransport: Send + Sync + 'static {
    /// Select a device, connect and discover its services.
    async fn open(&self) -> Result<(), ConnectionError>;

    /// Whether the connected device exposes `uuid`.
    async fn has_characteristic(&self, uuid: Uuid) -> bool;

    /// Enable notifications or indications on `uuid`.
    async fn subscribe(&self, uuid: Uuid) -> Result<(), TrainerError>;

    /// Stream of incoming values. Ends when the device goes away.
    async fn notifications(&self) -> Result<NotificationStream, TrainerError>;

    /// Write with response.
    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<(), TrainerError>;

    /// Release the device. No-op when nothing is open.
    async fn close(&self) -> Result<(), TrainerError>;
}

/// Timeouts for device selection.
#[derive(Debug, Clone)]
pub struct BtleTransportConfig {
    /// How long to scan for a device advertising the service
    pub scan_timeout: Duration,
    /// Timeout for connection attempt
    pub connection_timeout: Duration,
    /// Only accept devices whose advertised name contains this
    pub name_filter: Option<String>,
}

impl Default for BtleTransportConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            name_filter: None,
        }
    }
}

/// btleplug transport bound to the first device advertising `service`.
pub struct BtleTransport {
    service: Uuid,
    config: BtleTransportConfig,
    peripheral: Mutex<Option<Peripheral>>,
}

impl BtleTransport {
    pub fn new(service: Uuid, config: BtleTransportConfig) -> Self {
        Self {
            service,
            config,
            peripheral: Mutex::new(None),
        }
    }

    async fn select_device(&self) -> Result<Peripheral, ConnectionError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ConnectionError::GattUnavailable(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ConnectionError::GattUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(ConnectionError::AdapterNotFound)?;

        adapter
            .start_scan(ScanFilter {
                services: vec![self.service],
            })
            .await
            .map_err(|e| ConnectionError::GattUnavailable(e.to_string()))?;

        tracing::info!("Scanning for devices advertising {}", self.service);

        let found = tokio::time::timeout(self.config.scan_timeout, async {
            loop {
                if let Ok(peripherals) = adapter.peripherals().await {
                    for peripheral in peripherals {
                        if self.matches(&peripheral).await {
                            return peripheral;
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await;

        if let Err(e) = adapter.stop_scan().await {
            tracing::debug!("Failed to stop scan: {}", e);
        }

        found.map_err(|_| ConnectionError::SelectionCancelled)
    }

    async fn matches(&self, peripheral: &Peripheral) -> bool {
        let Ok(Some(properties)) = peripheral.properties().await else {
            return false;
        };

        if !properties.services.contains(&self.service) {
            return false;
        }

        match (&self.config.name_filter, &properties.local_name) {
            (None, _) => true,
            (Some(filter), Some(name)) => name.contains(filter.as_str()),
            (Some(_), None) => false,
        }
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<(Peripheral, Characteristic), TrainerError> {
        let guard = self.peripheral.lock().await;
        let peripheral = guard.as_ref().ok_or(TrainerError::NotConnected)?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(ConnectionError::CharacteristicMissing(uuid))?;

        Ok((peripheral.clone(), characteristic))
    }
}

#[async_trait]
impl GattTransport for BtleTransport {
    async fn open(&self) -> Result<(), ConnectionError> {
        let peripheral = self.select_device().await?;

        tokio::time::timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::GattUnavailable(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| ConnectionError::GattUnavailable(e.to_string()))?;

        tracing::info!("Connected to device: {}", peripheral.id());

        *self.peripheral.lock().await = Some(peripheral);
        Ok(())
    }

    async fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.peripheral
            .lock()
            .await
            .as_ref()
            .map(|p| p.characteristics().iter().any(|c| c.uuid == uuid))
            .unwrap_or(false)
    }

    async fn subscribe(&self, uuid: Uuid) -> Result<(), TrainerError> {
        let (peripheral, characteristic) = self.characteristic(uuid).await?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| TrainerError::SubscriptionFailed(e.to_string()))?;

        tracing::debug!("Subscribed to characteristic: {}", uuid);
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream, TrainerError> {
        let guard = self.peripheral.lock().await;
        let peripheral = guard.as_ref().ok_or(TrainerError::NotConnected)?;

        let stream = peripheral
            .notifications()
            .await
            .map_err(|e| TrainerError::BleError(e.to_string()))?;

        Ok(Box::pin(stream.map(|n| GattNotification {
            uuid: n.uuid,
            value: n.value,
        })))
    }

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<(), TrainerError> {
        let (peripheral, characteristic) = self.characteristic(uuid).await?;

        peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(|e| TrainerError::WriteFailed(e.to_string()))
    }

    async fn close(&self) -> Result<(), TrainerError> {
        let Some(peripheral) = self.peripheral.lock().await.take() else {
            return Ok(());
        };

        peripheral
            .disconnect()
            .await
            .map_err(|e| TrainerError::BleError(e.to_string()))
    }
}
