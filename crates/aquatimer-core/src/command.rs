//! Bridge commands
//!
//! Inbound messages on the command topic look like
//! `{"cmd": "get", "item": "battery"}` or
//! `{"cmd": "set", "item": "rain_delay_time", "value": 0}`. The notifiers
//! synthesize the same commands for scheduled polling.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::ALL_ATTRIBUTES;
use crate::types::AttributeValue;

/// A unit of work flowing through the bridge queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Read one attribute, or every readable attribute when `item` is `all`
    Get { item: String },
    /// Write one attribute
    Set { item: String, value: AttributeValue },
}

impl Command {
    pub fn get(item: impl Into<String>) -> Self {
        Command::Get { item: item.into() }
    }

    pub fn get_all() -> Self {
        Command::get(ALL_ATTRIBUTES)
    }

    pub fn set(item: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Command::Set {
            item: item.into(),
            value: value.into(),
        }
    }

    /// Parse a command from a raw JSON payload
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn item(&self) -> &str {
        match self {
            Command::Get { item } | Command::Set { item, .. } => item,
        }
    }

    pub fn is_get_all(&self) -> bool {
        matches!(self, Command::Get { item } if item == ALL_ATTRIBUTES)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
