//! MQTT transport for the Aqua Systems tap timer bridge
//!
//! This crate implements `MessageTransport` from `aquatimer-core` on top of
//! rumqttc. Commands arrive on a subscribed topic and state is published back
//! with at-least-once delivery.
//!
//! ## Architecture
//!
//! - [`config`] - broker URL, client identity and keep-alive
//! - [`error`] - MQTT errors and their mapping onto the bridge taxonomy
//! - [`client`] - the `MessageTransport` implementation and its event loop
//!
//! ## Usage
//!
//! ```rust,no_run
//! use aquatimer_mqtt::{MqttConfig, MqttMessageTransport};
//!
//! # async fn run() -> aquatimer_mqtt::Result<()> {
//! let transport = MqttMessageTransport::connect(&MqttConfig::new("mqtt://192.168.1.10"))?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::MqttMessageTransport;
pub use config::{BrokerAddress, MqttConfig};
pub use error::{MqttError, Result};
