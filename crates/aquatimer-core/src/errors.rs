//! Error types for the tap timer bridge
//!
//! Every failure the bridge can observe is classified here: codec shape
//! violations, facade-level rejections, device transport faults, connection
//! phase faults and message transport faults. [`AquaError`] unifies them for
//! callers that only need to log and carry on.

use std::time::Duration;

use crate::attributes::ServiceId;

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Shape violations detected while encoding or decoding a frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("attribute {attribute} takes {expected} value(s), got {actual}")]
    ArityMismatch {
        attribute: String,
        expected: usize,
        actual: usize,
    },
    #[error("frame for {attribute} too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        attribute: String,
        expected: usize,
        actual: usize,
    },
    #[error("frame for {attribute} too long: expected {expected} bytes, got {actual}")]
    FrameTooLong {
        attribute: String,
        expected: usize,
        actual: usize,
    },
    #[error(
        "frame for {attribute} does not match protocol at byte {position}: expected {expected:#04x}, got {actual:#04x}"
    )]
    ProtocolMismatch {
        attribute: String,
        position: usize,
        expected: u8,
        actual: u8,
    },
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Faults raised by a device transport during characteristic I/O
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFault {
    #[error("timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("device disconnected")]
    Disconnected,
    #[error("characteristic {uuid} not found in {service} service")]
    CharacteristicNotFound { service: ServiceId, uuid: uuid::Uuid },
    #[error("GATT error: {0}")]
    Gatt(String),
}

impl TransportFault {
    pub fn timeout(duration: Duration) -> Self {
        TransportFault::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Faults raised while locating and connecting to the device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("no BLE adapter available")]
    AdapterNotAvailable,
    #[error("device {name:?} not found within {window_ms}ms")]
    DeviceNotFound { name: String, window_ms: u64 },
    #[error("connection timed out after {duration_ms}ms")]
    ConnectTimeout { duration_ms: u64 },
    #[error("required {0} service missing on device")]
    ServiceMissing(ServiceId),
    #[error("transport error during connection: {0}")]
    Transport(String),
}

/// Faults raised by the message transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
    #[error("{topic} timed out after {duration_ms}ms")]
    TimedOut { topic: String, duration_ms: u64 },
    #[error("message transport closed")]
    Closed,
    #[error("message transport error: {0}")]
    Other(String),
}

// ----------------------------------------------------------------------------
// Device Facade Errors
// ----------------------------------------------------------------------------

/// Errors returned by the device facade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),
    #[error("attribute is not writable: {0}")]
    NotWritable(String),
    #[error("attribute is not readable: {0}")]
    NotReadable(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("transport error on {attribute}: {cause}")]
    Transport {
        attribute: String,
        #[source]
        cause: TransportFault,
    },
}

impl DeviceError {
    /// Whether the underlying link dropped and the facade should be discarded
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            DeviceError::Transport {
                cause: TransportFault::Disconnected,
                ..
            }
        )
    }
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Unified error for the bridge
#[derive(Debug, thiserror::Error)]
pub enum AquaError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

pub type Result<T> = std::result::Result<T, AquaError>;

impl MessageError {
    pub fn timeout(topic: &str, duration: Duration) -> Self {
        MessageError::TimedOut {
            topic: topic.to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}
