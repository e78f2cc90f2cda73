//! Device transport over btleplug

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use aquatimer_core::{CharacteristicRef, ConnectError, DeviceTransport, TransportFault};

use crate::config::BleConfig;
use crate::connection::BleConnection;
use crate::discovery::BleDiscovery;
use crate::error::BleTransportError;

// ----------------------------------------------------------------------------
// BLE Timer Transport
// ----------------------------------------------------------------------------

/// [`DeviceTransport`] backed by the host's BLE adapter
pub struct BleTimerTransport {
    config: BleConfig,
    discovery: Mutex<BleDiscovery>,
    connection: RwLock<Option<BleConnection>>,
}

impl BleTimerTransport {
    pub fn new(config: BleConfig) -> Self {
        Self {
            discovery: Mutex::new(BleDiscovery::new(config.clone())),
            config,
            connection: RwLock::new(None),
        }
    }
}

impl Default for BleTimerTransport {
    fn default() -> Self {
        Self::new(BleConfig::default())
    }
}

#[async_trait]
impl DeviceTransport for BleTimerTransport {
    async fn scan(&self, device_name: &str, window: Duration) -> Result<(), ConnectError> {
        let peripheral = self
            .discovery
            .lock()
            .await
            .find_by_name(device_name, window)
            .await?;

        let previous = self
            .connection
            .write()
            .await
            .replace(BleConnection::new(self.config.clone(), peripheral));
        if let Some(previous) = previous {
            if let Err(e) = previous.disconnect().await {
                debug!("Failed to release previous peripheral: {}", e);
            }
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        let connection = self.connection.read().await;
        let connection = connection.as_ref().ok_or(BleTransportError::NotLocated)?;
        Ok(connection.connect().await?)
    }

    async fn discover_services(&self) -> Result<Vec<Uuid>, ConnectError> {
        let connection = self.connection.read().await;
        let connection = connection.as_ref().ok_or(BleTransportError::NotLocated)?;
        Ok(connection.discover_services().await?)
    }

    async fn read(&self, characteristic: CharacteristicRef) -> Result<Vec<u8>, TransportFault> {
        let connection = self.connection.read().await;
        let connection = connection.as_ref().ok_or(TransportFault::Disconnected)?;
        Ok(connection.read(characteristic).await?)
    }

    async fn write(
        &self,
        characteristic: CharacteristicRef,
        frame: &[u8],
    ) -> Result<(), TransportFault> {
        let connection = self.connection.read().await;
        let connection = connection.as_ref().ok_or(TransportFault::Disconnected)?;
        Ok(connection.write(characteristic, frame).await?)
    }

    async fn disconnect(&self) -> Result<(), TransportFault> {
        match self.connection.read().await.as_ref() {
            Some(connection) => Ok(connection.disconnect().await?),
            None => Ok(()),
        }
    }
}
