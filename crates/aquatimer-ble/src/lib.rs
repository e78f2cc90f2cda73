//! Bluetooth Low Energy transport for the Aqua Systems tap timer
//!
//! This crate implements `DeviceTransport` from `aquatimer-core` on top of
//! btleplug, so the bridge can reach a real timer.
//!
//! ## Architecture
//!
//! - [`config`] - adapter selection and write mode
//! - [`error`] - BLE errors and their mapping onto the bridge taxonomy
//! - [`discovery`] - adapter setup and scanning by advertised name
//! - [`connection`] - connection lifecycle and characteristic I/O
//! - [`transport`] - the `DeviceTransport` implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aquatimer_ble::{BleConfig, BleTimerTransport};
//! use aquatimer_core::DeviceTransport;
//!
//! let transport: Arc<dyn DeviceTransport> =
//!     Arc::new(BleTimerTransport::new(BleConfig::new().with_adapter_index(0)));
//! ```

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod transport;

pub use config::BleConfig;
pub use error::BleTransportError;
pub use transport::BleTimerTransport;
