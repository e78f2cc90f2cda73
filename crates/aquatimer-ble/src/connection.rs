//! Connection to the timer and characteristic I/O

use btleplug::api::{Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aquatimer_core::CharacteristicRef;

use crate::config::BleConfig;
use crate::error::{BleTransportError, Result};

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// A located timer peripheral
pub struct BleConnection {
    config: BleConfig,
    peripheral: Peripheral,
}

impl BleConnection {
    pub fn new(config: BleConfig, peripheral: Peripheral) -> Self {
        Self { config, peripheral }
    }

    pub async fn connect(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }
        self.peripheral.connect().await?;
        info!("Connected to {}", self.peripheral.address());
        Ok(())
    }

    /// Discover GATT services, returning their UUIDs
    pub async fn discover_services(&self) -> Result<Vec<Uuid>> {
        self.peripheral.discover_services().await?;
        let services: Vec<Uuid> = self
            .peripheral
            .services()
            .into_iter()
            .map(|service| service.uuid)
            .collect();
        debug!("Discovered {} services", services.len());
        Ok(services)
    }

    pub async fn read(&self, target: CharacteristicRef) -> Result<Vec<u8>> {
        let characteristic = self.find_characteristic(target)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    pub async fn write(&self, target: CharacteristicRef, frame: &[u8]) -> Result<()> {
        let characteristic = self.find_characteristic(target)?;
        self.peripheral
            .write(&characteristic, frame, self.config.write_type())
            .await?;
        debug!("Wrote {} to {}", hex::encode(frame), target.uuid);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        if self.is_connected().await {
            self.peripheral.disconnect().await?;
            info!("Disconnected from {}", self.peripheral.address());
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        match self.peripheral.is_connected().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!("Failed to query connection state: {}", e);
                false
            }
        }
    }

    fn find_characteristic(&self, target: CharacteristicRef) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| is_target(characteristic, target))
            .ok_or(BleTransportError::CharacteristicNotFound {
                service: target.service,
                uuid: target.uuid,
            })
    }
}

/// Characteristics are matched within their service group, since the
/// characteristic UUID alone is not guaranteed unique across services
fn is_target(characteristic: &Characteristic, target: CharacteristicRef) -> bool {
    characteristic.uuid == target.uuid && characteristic.service_uuid == target.service.uuid()
}
