//! Transport abstractions used by the bridge
//!
//! The bridge never talks to BlueZ or an MQTT broker directly. It drives a
//! [`DeviceTransport`] for GATT characteristic I/O and a [`MessageTransport`]
//! for topic-based messaging, so that the pipeline can run against real
//! adapters in production and in-memory fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::attributes::{AttributeDescriptor, ServiceId};
use crate::errors::{ConnectError, MessageError, TransportFault};

// ----------------------------------------------------------------------------
// Device Transport
// ----------------------------------------------------------------------------

/// Address of a GATT characteristic within a service group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    pub service: ServiceId,
    pub uuid: Uuid,
}

impl CharacteristicRef {
    pub fn new(service: ServiceId, uuid: Uuid) -> Self {
        Self { service, uuid }
    }
}

impl From<&AttributeDescriptor> for CharacteristicRef {
    fn from(descriptor: &AttributeDescriptor) -> Self {
        Self::new(descriptor.service, descriptor.characteristic)
    }
}

/// BLE capability needed to reach the tap timer
///
/// Methods take `&self` so that one connection can be shared between the
/// supervisor, which sequences the connection, and the device facade.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Scan until a device advertising `device_name` is seen or `window` expires
    async fn scan(&self, device_name: &str, window: Duration) -> Result<(), ConnectError>;

    /// Connect to the device located by the last successful scan
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Discover services, returning the UUIDs of every primary service found
    async fn discover_services(&self) -> Result<Vec<Uuid>, ConnectError>;

    /// Read the raw value of a characteristic
    async fn read(&self, characteristic: CharacteristicRef) -> Result<Vec<u8>, TransportFault>;

    /// Write a raw frame to a characteristic
    async fn write(
        &self,
        characteristic: CharacteristicRef,
        frame: &[u8],
    ) -> Result<(), TransportFault>;

    /// Release the connection
    async fn disconnect(&self) -> Result<(), TransportFault>;
}

// ----------------------------------------------------------------------------
// Message Transport
// ----------------------------------------------------------------------------

/// A message delivered on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe capability used for commands and state
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Subscribe to a topic with at-least-once delivery
    async fn subscribe(&self, topic: &str) -> Result<(), MessageError>;

    /// Publish a payload with at-least-once delivery
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MessageError>;

    /// Wait for the next inbound message; `None` once the transport is closed
    async fn next_message(&self) -> Option<InboundMessage>;

    /// Disconnect from the broker
    async fn disconnect(&self) -> Result<(), MessageError>;
}
