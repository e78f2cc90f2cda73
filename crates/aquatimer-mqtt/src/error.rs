//! Error types for the MQTT transport

use thiserror::Error;

/// Errors raised while setting up the MQTT transport
#[derive(Error, Debug)]
pub enum MqttError {
    #[error("Invalid broker URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result type for MQTT operations
pub type Result<T> = std::result::Result<T, MqttError>;
