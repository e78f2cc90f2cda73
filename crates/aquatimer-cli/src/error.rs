//! Error handling for the aquatimer daemon

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] aquatimer_runtime::BridgeError),

    #[error("Bridge core error: {0}")]
    Core(#[from] aquatimer_core::AquaError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] aquatimer_mqtt::MqttError),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
