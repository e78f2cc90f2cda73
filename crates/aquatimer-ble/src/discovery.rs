//! Adapter setup and device discovery
//!
//! The timer is located by its advertised local name. Peripherals the adapter
//! already knows about are checked first, then central events are watched
//! until the name shows up or the scan window closes.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::BleConfig;
use crate::error::{BleTransportError, Result};

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Finds the timer among nearby BLE devices
pub struct BleDiscovery {
    config: BleConfig,
    adapter: Option<Adapter>,
}

impl BleDiscovery {
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            adapter: None,
        }
    }

    /// Initialize the configured BLE adapter, once
    pub async fn initialize_adapter(&mut self) -> Result<&Adapter> {
        if self.adapter.is_none() {
            let manager = Manager::new().await?;
            let adapters = manager.adapters().await?;
            let adapter = adapters
                .into_iter()
                .nth(self.config.adapter_index)
                .ok_or(BleTransportError::AdapterNotAvailable)?;

            match adapter.adapter_info().await {
                Ok(info) => info!("BLE adapter initialized: {}", info),
                Err(e) => debug!("BLE adapter initialized, no adapter info: {}", e),
            }
            self.adapter = Some(adapter);
        }

        self.adapter.as_ref().ok_or(BleTransportError::AdapterNotAvailable)
    }

    /// Scan for a peripheral advertising `name`
    pub async fn find_by_name(&mut self, name: &str, window: Duration) -> Result<Peripheral> {
        let deadline = Instant::now() + window;
        let adapter = self.initialize_adapter().await?.clone();

        let mut events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;
        debug!("Scanning for {:?} for {:?}", name, window);

        let found = Self::search(&adapter, name, deadline, &mut events).await;

        if let Err(e) = adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }

        match found {
            Some(peripheral) => {
                info!("Found {} at {}", name, peripheral.address());
                Ok(peripheral)
            }
            None => Err(BleTransportError::DeviceNotFound {
                name: name.to_string(),
                window,
            }),
        }
    }

    async fn search<S>(
        adapter: &Adapter,
        name: &str,
        deadline: Instant,
        events: &mut S,
    ) -> Option<Peripheral>
    where
        S: futures::Stream<Item = CentralEvent> + Unpin,
    {
        for peripheral in adapter.peripherals().await.unwrap_or_default() {
            if has_name(&peripheral, name).await {
                return Some(peripheral);
            }
        }

        while let Ok(Some(event)) = timeout_at(deadline, events.next()).await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };
            if let Some(peripheral) = Self::named_peripheral(adapter, &id, name).await {
                return Some(peripheral);
            }
        }
        None
    }

    async fn named_peripheral(
        adapter: &Adapter,
        id: &PeripheralId,
        name: &str,
    ) -> Option<Peripheral> {
        let peripheral = adapter.peripheral(id).await.ok()?;
        has_name(&peripheral, name).await.then_some(peripheral)
    }
}

async fn has_name(peripheral: &Peripheral, name: &str) -> bool {
    match peripheral.properties().await {
        Ok(Some(properties)) => properties.local_name.as_deref() == Some(name),
        _ => false,
    }
}
