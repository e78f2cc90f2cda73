//! Aqua Systems Tap Timer Core
//!
//! This crate provides the foundational pieces of the tap timer bridge:
//! - the attribute descriptor table describing every device attribute as data
//! - the table-driven codec turning GATT frames into values and back
//! - the command and value types exchanged over the message bus
//! - the transport traits the bridge drives, and the device facade on top
//!
//! Nothing here performs real I/O. BLE and MQTT adapters live in their own
//! crates and plug in through [`DeviceTransport`] and [`MessageTransport`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod attributes;
pub mod codec;
pub mod command;
pub mod device;
pub mod errors;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use attributes::{
    AttributeDescriptor, AttributeTable, Derivation, Field, ServiceId, ALL_ATTRIBUTES,
};
pub use codec::LiteralPolicy;
pub use command::Command;
pub use device::{TimerDevice, DEFAULT_IO_TIMEOUT};
pub use errors::{
    AquaError, CodecError, ConnectError, DeviceError, MessageError, Result, TransportFault,
};
pub use transport::{CharacteristicRef, DeviceTransport, InboundMessage, MessageTransport};
pub use types::{AttributeValue, Snapshot};
