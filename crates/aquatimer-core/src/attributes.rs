//! Attribute descriptor table for the tap timer
//!
//! Each device attribute is described once, as data: which GATT service and
//! characteristic carries it, the byte layout of its frame and what the bridge
//! is allowed to do with it. Literal bytes in a layout are protocol constants
//! (an opcode followed by the payload length on the timer service) and named
//! slots carry the attribute's data, one byte each.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Vendor timer service
pub const TIMER_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FCC0_0000_1000_8000_00805F9B34FB);

/// Standard GATT battery service
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180F_0000_1000_8000_00805F9B34FB);

/// Standard battery level characteristic
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002A19_0000_1000_8000_00805F9B34FB);

pub const TIMER_OFF_UUID: Uuid = Uuid::from_u128(0x0000FCC2_0000_1000_8000_00805F9B34FB);
pub const CLOCK_UUID: Uuid = Uuid::from_u128(0x0000FCC4_0000_1000_8000_00805F9B34FB);
pub const STATUS_UUID: Uuid = Uuid::from_u128(0x0000FCD1_0000_1000_8000_00805F9B34FB);
pub const CYCLE_DURATION_UUID: Uuid = Uuid::from_u128(0x0000FCD2_0000_1000_8000_00805F9B34FB);
pub const CYCLE_FREQUENCY_UUID: Uuid = Uuid::from_u128(0x0000FCD3_0000_1000_8000_00805F9B34FB);
pub const CYCLE1_START_UUID: Uuid = Uuid::from_u128(0x0000FCD4_0000_1000_8000_00805F9B34FB);
pub const CYCLE2_START_UUID: Uuid = Uuid::from_u128(0x0000FCD5_0000_1000_8000_00805F9B34FB);
pub const RAIN_DELAY_UUID: Uuid = Uuid::from_u128(0x0000FCD6_0000_1000_8000_00805F9B34FB);
pub const MANUAL_TIME_UUID: Uuid = Uuid::from_u128(0x0000FCD9_0000_1000_8000_00805F9B34FB);

/// Item name that addresses every readable attribute at once
pub const ALL_ATTRIBUTES: &str = "all";

// ----------------------------------------------------------------------------
// Descriptor Types
// ----------------------------------------------------------------------------

/// GATT service group that owns a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Timer,
    Battery,
}

impl ServiceId {
    /// Services the bridge needs before it can build a device facade
    pub const REQUIRED: [ServiceId; 2] = [ServiceId::Timer, ServiceId::Battery];

    pub const fn uuid(self) -> Uuid {
        match self {
            ServiceId::Timer => TIMER_SERVICE_UUID,
            ServiceId::Battery => BATTERY_SERVICE_UUID,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Timer => write!(f, "timer"),
            ServiceId::Battery => write!(f, "battery"),
        }
    }
}

/// One byte position in an attribute frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Protocol constant, emitted verbatim on write
    Literal(u8),
    /// Caller data, consumed in left-to-right order
    Slot(&'static str),
}

/// Post-processing applied to a decoded value before it leaves the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Decoded value is exposed as-is
    Raw,
    /// `1` means on, anything else means off
    Switch,
    /// `[enabled, minutes]` collapses to `minutes` when enabled, else `0`
    GatedMinutes,
}

/// Wire format and capabilities of a single device attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub service: ServiceId,
    pub characteristic: Uuid,
    pub layout: &'static [Field],
    pub readable: bool,
    pub writable: bool,
    pub notifiable: bool,
    pub derivation: Derivation,
}

impl AttributeDescriptor {
    /// Length of a frame for this attribute
    pub fn frame_len(&self) -> usize {
        self.layout.len()
    }

    /// Number of caller-supplied values a frame carries
    pub fn slot_count(&self) -> usize {
        self.layout
            .iter()
            .filter(|field| matches!(field, Field::Slot(_)))
            .count()
    }

    /// Slot names in frame order
    pub fn slot_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.layout.iter().filter_map(|field| match field {
            Field::Slot(name) => Some(*name),
            Field::Literal(_) => None,
        })
    }
}

// ----------------------------------------------------------------------------
// Reference Table
// ----------------------------------------------------------------------------

use Field::{Literal, Slot};

static DESCRIPTORS: &[AttributeDescriptor] = &[
    AttributeDescriptor {
        name: "battery",
        service: ServiceId::Battery,
        characteristic: BATTERY_LEVEL_UUID,
        layout: &[Slot("level")],
        readable: true,
        writable: false,
        notifiable: true,
        derivation: Derivation::Raw,
    },
    // b'R\x01\x01'
    AttributeDescriptor {
        name: "on",
        service: ServiceId::Timer,
        characteristic: TIMER_OFF_UUID,
        layout: &[Literal(0x52), Literal(0x01), Slot("on")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Switch,
    },
    // 1 = off, 2 = auto, 9/10 = manual
    AttributeDescriptor {
        name: "status",
        service: ServiceId::Timer,
        characteristic: STATUS_UUID,
        layout: &[Literal(0x61), Literal(0x01), Slot("status")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    AttributeDescriptor {
        name: "time",
        service: ServiceId::Timer,
        characteristic: CLOCK_UUID,
        layout: &[
            Literal(0x54),
            Literal(0x04),
            Slot("hours"),
            Slot("minutes"),
            Slot("seconds"),
            Literal(0x04),
        ],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    // hours of 0xff disables the cycle
    AttributeDescriptor {
        name: "cycle1_start",
        service: ServiceId::Timer,
        characteristic: CYCLE1_START_UUID,
        layout: &[Literal(0x64), Literal(0x02), Slot("hours"), Slot("mins")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    AttributeDescriptor {
        name: "cycle2_start",
        service: ServiceId::Timer,
        characteristic: CYCLE2_START_UUID,
        layout: &[Literal(0x65), Literal(0x02), Slot("hours"), Slot("mins")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    AttributeDescriptor {
        name: "cycle_duration",
        service: ServiceId::Timer,
        characteristic: CYCLE_DURATION_UUID,
        layout: &[Literal(0x62), Literal(0x02), Literal(0x00), Slot("duration")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    AttributeDescriptor {
        name: "cycle_frequency",
        service: ServiceId::Timer,
        characteristic: CYCLE_FREQUENCY_UUID,
        layout: &[
            Literal(0x63),
            Literal(0x03),
            Literal(0x00),
            Slot("days"),
            Literal(0x7f),
        ],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
    // b'i\x03\x01\x00\x05' is manual watering with 5 minutes left
    AttributeDescriptor {
        name: "manual_time_left",
        service: ServiceId::Timer,
        characteristic: MANUAL_TIME_UUID,
        layout: &[
            Literal(0x69),
            Literal(0x03),
            Slot("status"),
            Literal(0x00),
            Slot("duration"),
        ],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::GatedMinutes,
    },
    AttributeDescriptor {
        name: "rain_delay_time",
        service: ServiceId::Timer,
        characteristic: RAIN_DELAY_UUID,
        layout: &[Literal(0x66), Literal(0x01), Slot("duration")],
        readable: true,
        writable: true,
        notifiable: false,
        derivation: Derivation::Raw,
    },
];

// ----------------------------------------------------------------------------
// Attribute Table
// ----------------------------------------------------------------------------

/// Read-only lookup over a set of attribute descriptors
#[derive(Debug, Clone, Copy)]
pub struct AttributeTable {
    descriptors: &'static [AttributeDescriptor],
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl AttributeTable {
    /// Table for the Aqua Systems single-outlet timer
    pub const fn standard() -> Self {
        Self {
            descriptors: DESCRIPTORS,
        }
    }

    /// Build a table over custom descriptors
    pub const fn from_static(descriptors: &'static [AttributeDescriptor]) -> Self {
        Self { descriptors }
    }

    /// Resolve an attribute by name
    pub fn lookup(&self, name: &str) -> Option<&'static AttributeDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static AttributeDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptors included in a full snapshot, in table order
    pub fn readable(&self) -> impl Iterator<Item = &'static AttributeDescriptor> {
        self.descriptors.iter().filter(|d| d.readable)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.descriptors.iter().map(|d| d.name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
