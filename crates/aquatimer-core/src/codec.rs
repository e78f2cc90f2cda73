//! Table-driven attribute codec
//!
//! A frame is interpreted by walking the descriptor's layout in lockstep with
//! the bytes: literal positions are protocol constants, slot positions carry
//! data. Both directions are pure transforms; I/O lives in the device facade.

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeDescriptor, Derivation, Field};
use crate::errors::CodecError;
use crate::types::AttributeValue;

// ----------------------------------------------------------------------------
// Literal Policy
// ----------------------------------------------------------------------------

/// How literal positions of an inbound frame are treated on decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralPolicy {
    /// Every literal must match, otherwise the frame is rejected
    #[default]
    Strict,
    /// Literal positions are skipped without comparison
    Lenient,
}

impl LiteralPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            LiteralPolicy::Strict
        } else {
            LiteralPolicy::Lenient
        }
    }
}

// ----------------------------------------------------------------------------
// Decode / Encode
// ----------------------------------------------------------------------------

/// Decode a raw frame into the attribute's slot values
///
/// Returns a scalar when the layout has exactly one slot and an ordered list
/// otherwise.
pub fn decode(
    descriptor: &AttributeDescriptor,
    frame: &[u8],
    policy: LiteralPolicy,
) -> Result<AttributeValue, CodecError> {
    let expected = descriptor.frame_len();
    if frame.len() < expected {
        return Err(CodecError::FrameTooShort {
            attribute: descriptor.name.to_string(),
            expected,
            actual: frame.len(),
        });
    }
    if frame.len() > expected {
        return Err(CodecError::FrameTooLong {
            attribute: descriptor.name.to_string(),
            expected,
            actual: frame.len(),
        });
    }

    let mut values = Vec::with_capacity(descriptor.slot_count());
    for (position, (field, byte)) in descriptor.layout.iter().zip(frame).enumerate() {
        match field {
            Field::Slot(_) => values.push(*byte),
            Field::Literal(literal) => {
                if policy == LiteralPolicy::Strict && literal != byte {
                    return Err(CodecError::ProtocolMismatch {
                        attribute: descriptor.name.to_string(),
                        position,
                        expected: *literal,
                        actual: *byte,
                    });
                }
            }
        }
    }

    if values.len() == 1 {
        Ok(AttributeValue::Scalar(values[0]))
    } else {
        Ok(AttributeValue::List(values))
    }
}

/// Encode slot values into a frame ready for a characteristic write
pub fn encode(
    descriptor: &AttributeDescriptor,
    value: AttributeValue,
) -> Result<Vec<u8>, CodecError> {
    let values = value.into_slots();
    let expected = descriptor.slot_count();
    if values.len() != expected {
        return Err(CodecError::ArityMismatch {
            attribute: descriptor.name.to_string(),
            expected,
            actual: values.len(),
        });
    }

    let mut inputs = values.into_iter();
    let frame = descriptor
        .layout
        .iter()
        .map(|field| match field {
            Field::Literal(literal) => *literal,
            // arity was checked above
            Field::Slot(_) => inputs.next().unwrap_or_default(),
        })
        .collect();
    Ok(frame)
}

/// Apply the descriptor's derivation to a decoded value
pub fn derive(descriptor: &AttributeDescriptor, value: AttributeValue) -> AttributeValue {
    match descriptor.derivation {
        Derivation::Raw => value,
        Derivation::Switch => AttributeValue::Flag(value.as_scalar() == Some(1)),
        Derivation::GatedMinutes => match value.as_list() {
            Some([1, minutes]) => AttributeValue::Scalar(*minutes),
            _ => AttributeValue::Scalar(0),
        },
    }
}
