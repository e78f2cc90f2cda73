//! MQTT transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{MqttError, Result};

pub const DEFAULT_BROKER_URL: &str = "mqtt://127.0.0.1";
pub const DEFAULT_MQTT_PORT: u16 = 1883;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the MQTT message transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL, `mqtt://[user:password@]host[:port]`
    pub url: String,
    /// Client identifier; a random one is generated when unset
    pub client_id: Option<String>,
    /// Overrides credentials embedded in the URL
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Capacity of the request channel between client and event loop
    pub channel_capacity: usize,
    /// Pause before polling again after a connection error
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BROKER_URL.to_string(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
            channel_capacity: 10,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

impl MqttConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_keep_alive(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// The configured client id, or a fresh `aquatimer-xxxxxxxx`
    pub fn effective_client_id(&self) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            let id = Uuid::new_v4().simple().to_string();
            format!("aquatimer-{}", &id[..8])
        })
    }

    /// Resolve the broker URL into host, port and credentials
    ///
    /// A bare host such as `192.168.1.10` is accepted as `mqtt://192.168.1.10`.
    pub fn broker_address(&self) -> Result<BrokerAddress> {
        let raw = if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("mqtt://{}", self.url)
        };

        let url = Url::parse(&raw).map_err(|e| MqttError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "mqtt" | "tcp" => {}
            other => return Err(MqttError::UnsupportedScheme(other.to_string())),
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| MqttError::InvalidUrl {
                url: self.url.clone(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        let credentials = match (&self.username, &self.password) {
            (Some(username), password) => {
                Some((username.clone(), password.clone().unwrap_or_default()))
            }
            (None, _) if !url.username().is_empty() => Some((
                url.username().to_string(),
                url.password().unwrap_or_default().to_string(),
            )),
            _ => None,
        };

        Ok(BrokerAddress {
            host,
            port: url.port().unwrap_or(DEFAULT_MQTT_PORT),
            credentials,
        })
    }
}
