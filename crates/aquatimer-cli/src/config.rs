//! Daemon configuration
//!
//! One optional TOML file with a section per component:
//!
//! ```toml
//! [ble]
//! adapter_index = 0
//!
//! [mqtt]
//! url = "mqtt://192.168.1.10:1883"
//!
//! [bridge]
//! device_name = "Spray-Mist A19E"
//! state_interval_secs = 60
//!
//! [bridge.topics.overrides]
//! battery = "$SYS/broker/aquatimer/battery"
//! ```
//!
//! Missing sections and keys fall back to their defaults. Command-line flags
//! are applied on top of the file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use aquatimer_ble::BleConfig;
use aquatimer_mqtt::MqttConfig;
use aquatimer_runtime::BridgeConfig;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the `aquatimer` daemon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// BLE adapter settings
    pub ble: BleConfig,
    /// Broker connection settings
    pub mqtt: MqttConfig,
    /// Device name, topics and timing
    pub bridge: BridgeConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn apply_overrides(&mut self, device_id: Option<&str>, broker_url: Option<&str>) {
        if let Some(name) = device_id {
            debug!("Device name overridden: {}", name);
            self.bridge.device_name = name.to_string();
        }
        if let Some(url) = broker_url {
            debug!("Broker URL overridden: {}", url);
            self.mqtt.url = url.to_string();
        }
    }

    /// Reject values the bridge cannot start with
    pub fn validate(&self) -> Result<()> {
        self.bridge.validate()?;
        self.mqtt.broker_address()?;
        if self.mqtt.channel_capacity == 0 {
            return Err(CliError::Config(
                "mqtt channel capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Example configuration file content
    pub fn example_config() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}
