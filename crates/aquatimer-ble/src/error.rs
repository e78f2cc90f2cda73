//! Error types for the BLE transport

use std::time::Duration;

use aquatimer_core::{ConnectError, ServiceId, TransportFault};
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE transport
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Device {name:?} not found within {window:?}")]
    DeviceNotFound { name: String, window: Duration },

    #[error("No device located, scan first")]
    NotLocated,

    #[error("Device not connected")]
    NotConnected,

    #[error("Characteristic {uuid} not found in {service} service")]
    CharacteristicNotFound { service: ServiceId, uuid: Uuid },

    #[error("BLE operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("BLE error: {0}")]
    Btleplug(String),
}

/// Result type for BLE operations
pub type Result<T> = std::result::Result<T, BleTransportError>;

impl From<btleplug::Error> for BleTransportError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::NotConnected => BleTransportError::NotConnected,
            btleplug::Error::TimedOut(duration) => BleTransportError::TimedOut(duration),
            other => BleTransportError::Btleplug(other.to_string()),
        }
    }
}

impl From<BleTransportError> for ConnectError {
    fn from(err: BleTransportError) -> Self {
        match err {
            BleTransportError::AdapterNotAvailable => ConnectError::AdapterNotAvailable,
            BleTransportError::DeviceNotFound { name, window } => ConnectError::DeviceNotFound {
                name,
                window_ms: window.as_millis() as u64,
            },
            BleTransportError::TimedOut(duration) => ConnectError::ConnectTimeout {
                duration_ms: duration.as_millis() as u64,
            },
            other => ConnectError::Transport(other.to_string()),
        }
    }
}

impl From<BleTransportError> for TransportFault {
    fn from(err: BleTransportError) -> Self {
        match err {
            BleTransportError::NotConnected | BleTransportError::NotLocated => {
                TransportFault::Disconnected
            }
            BleTransportError::TimedOut(duration) => TransportFault::timeout(duration),
            BleTransportError::CharacteristicNotFound { service, uuid } => {
                TransportFault::CharacteristicNotFound { service, uuid }
            }
            other => TransportFault::Gatt(other.to_string()),
        }
    }
}
