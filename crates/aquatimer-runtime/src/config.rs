//! Bridge configuration

use std::collections::BTreeMap;
use std::time::Duration;

use aquatimer_core::{AquaError, LiteralPolicy};
use serde::{Deserialize, Serialize};

/// Advertised name of the timer the bridge was first deployed against
pub const DEFAULT_DEVICE_NAME: &str = "Spray-Mist A19E";

pub const DEFAULT_COMMAND_TOPIC: &str = "$SYS/broker/aquatimer/command";
pub const DEFAULT_INFO_TOPIC: &str = "$SYS/broker/aquatimer/info";
pub const DEFAULT_BATTERY_TOPIC: &str = "$SYS/broker/aquatimer/battery";

// ----------------------------------------------------------------------------
// Topics
// ----------------------------------------------------------------------------

/// Topic routing for commands and published state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic the bridge takes commands from
    pub command: String,
    /// Topic for full snapshots and single attributes without an override
    pub info: String,
    /// Per-attribute publish topics
    pub overrides: BTreeMap<String, String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND_TOPIC.to_string(),
            info: DEFAULT_INFO_TOPIC.to_string(),
            overrides: BTreeMap::from([("battery".to_string(), DEFAULT_BATTERY_TOPIC.to_string())]),
        }
    }
}

impl TopicConfig {
    /// Topic a single attribute's value is published to
    pub fn topic_for(&self, attribute: &str) -> &str {
        self.overrides
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(&self.info)
    }
}

// ----------------------------------------------------------------------------
// Bridge Configuration
// ----------------------------------------------------------------------------

/// Configuration for the bridge supervisor and its tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Advertised BLE name of the timer
    pub device_name: String,
    pub topics: TopicConfig,
    /// Grace period before the notifiers first poll
    #[serde(rename = "initial_delay_secs", with = "secs")]
    pub initial_delay: Duration,
    #[serde(rename = "battery_interval_secs", with = "secs")]
    pub battery_interval: Duration,
    #[serde(rename = "state_interval_secs", with = "secs")]
    pub state_interval: Duration,
    /// How long to look for the advertised name
    #[serde(rename = "scan_timeout_secs", with = "secs")]
    pub scan_timeout: Duration,
    #[serde(rename = "connect_timeout_secs", with = "secs")]
    pub connect_timeout: Duration,
    /// Bound on each characteristic read or write
    #[serde(rename = "io_timeout_secs", with = "secs")]
    pub io_timeout: Duration,
    /// Pause between reconnect attempts while no device is linked, zero disables
    #[serde(rename = "reconnect_interval_secs", with = "secs")]
    pub reconnect_interval: Duration,
    /// Reject frames whose protocol constants do not match
    ///
    /// A full snapshot is all-or-nothing, so one attribute whose firmware
    /// sends a different constant makes every `get all` fail. Turn this off
    /// for such devices; single-attribute reads are unaffected otherwise.
    pub strict_literals: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            topics: TopicConfig::default(),
            initial_delay: Duration::from_secs(5),
            battery_interval: Duration::from_secs(60),
            state_interval: Duration::from_secs(60),
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(30),
            strict_literals: true,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_topics(mut self, topics: TopicConfig) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_battery_interval(mut self, interval: Duration) -> Self {
        self.battery_interval = interval;
        self
    }

    pub fn with_state_interval(mut self, interval: Duration) -> Self {
        self.state_interval = interval;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the reconnect interval; `Duration::ZERO` disables reconnects
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_strict_literals(mut self, strict: bool) -> Self {
        self.strict_literals = strict;
        self
    }

    pub fn literal_policy(&self) -> LiteralPolicy {
        LiteralPolicy::from_strict(self.strict_literals)
    }

    pub fn reconnect_enabled(&self) -> bool {
        !self.reconnect_interval.is_zero()
    }

    /// Pause between attempts to subscribe to the command topic
    ///
    /// Follows the reconnect cadence, or the I/O timeout when reconnects are
    /// disabled, since the bridge is useless without its command topic.
    pub fn subscribe_retry_interval(&self) -> Duration {
        if self.reconnect_enabled() {
            self.reconnect_interval
        } else {
            self.io_timeout
        }
    }

    /// Check the configuration for values the bridge cannot run with
    pub fn validate(&self) -> Result<(), AquaError> {
        let invalid = |reason: &str| -> Result<(), AquaError> {
            Err(AquaError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };

        if self.device_name.trim().is_empty() {
            return invalid("device name must not be empty");
        }
        if self.topics.command.is_empty() || self.topics.info.is_empty() {
            return invalid("command and info topics must not be empty");
        }
        if self.topics.overrides.values().any(String::is_empty) {
            return invalid("topic overrides must not be empty");
        }
        if self.battery_interval.is_zero() || self.state_interval.is_zero() {
            return invalid("polling intervals must be greater than 0");
        }
        if self.scan_timeout.is_zero()
            || self.connect_timeout.is_zero()
            || self.io_timeout.is_zero()
        {
            return invalid("timeouts must be greater than 0");
        }
        Ok(())
    }
}

/// Serde helper for durations written as (fractional) seconds
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
