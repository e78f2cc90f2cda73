//! Tap Timer Bridge Runtime
//!
//! This crate runs the bridge between the timer and the message bus:
//! - `Supervisor`: connects to the timer, spawns the tasks and shuts them down
//! - `ProducerTask` / `ConsumerTask`: the command queue between broker and device
//! - `NotifierTask`: periodic battery and state polling
//! - `LinkMonitorTask`: reconnects after the device goes away
//!
//! Both transports are injected, so the runtime has no BLE or MQTT dependency
//! of its own.

pub mod config;
pub mod error;
pub mod state;
pub mod supervisor;
pub mod tasks;

pub use config::{BridgeConfig, TopicConfig};
pub use error::{BridgeError, Result};
pub use state::{BridgeHandle, LinkState, RunningFlag};
pub use supervisor::{Connector, Supervisor};
pub use tasks::{ConsumerTask, LinkMonitorTask, NotifierTask, ProducerTask};
