//! BLE transport configuration

use btleplug::api::WriteType;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE device transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Index into the host's adapter list
    pub adapter_index: usize,
    /// Request a GATT acknowledgement for every characteristic write
    pub write_with_response: bool,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            write_with_response: true,
        }
    }
}

impl BleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the adapter to use
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Enable or disable acknowledged writes
    pub fn with_write_with_response(mut self, enabled: bool) -> Self {
        self.write_with_response = enabled;
        self
    }

    pub(crate) fn write_type(&self) -> WriteType {
        if self.write_with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_acknowledged_writes() {
        let config = BleConfig::default();
        assert_eq!(config.adapter_index, 0);
        assert_eq!(config.write_type(), WriteType::WithResponse);

        let config = config.with_write_with_response(false).with_adapter_index(1);
        assert_eq!(config.write_type(), WriteType::WithoutResponse);
        assert_eq!(config.adapter_index, 1);
    }
}
