//! Value types exchanged between the codec, the facade and the bridge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A decoded attribute value, as published on the message bus
///
/// Serialized untagged so that a scalar travels as a JSON number, a
/// multi-slot value as an array of numbers and a switch as a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Scalar(u8),
    List(Vec<u8>),
}

impl AttributeValue {
    /// Flatten into slot bytes, coercing a scalar to a one-element list
    pub fn into_slots(self) -> Vec<u8> {
        match self {
            AttributeValue::Flag(flag) => vec![u8::from(flag)],
            AttributeValue::Scalar(value) => vec![value],
            AttributeValue::List(values) => values,
        }
    }

    pub fn as_scalar(&self) -> Option<u8> {
        match self {
            AttributeValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<u8> for AttributeValue {
    fn from(value: u8) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(flag: bool) -> Self {
        AttributeValue::Flag(flag)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(values: Vec<u8>) -> Self {
        AttributeValue::List(values)
    }
}

/// Attribute name to value, ordered by name for stable payloads
pub type Snapshot = BTreeMap<String, AttributeValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes() {
        assert_eq!(serde_json::to_string(&AttributeValue::Scalar(5)).unwrap(), "5");
        assert_eq!(
            serde_json::to_string(&AttributeValue::List(vec![5, 30])).unwrap(),
            "[5,30]"
        );
        assert_eq!(serde_json::to_string(&AttributeValue::Flag(true)).unwrap(), "true");

        let parsed: AttributeValue = serde_json::from_str("[21,23,4]").unwrap();
        assert_eq!(parsed, AttributeValue::List(vec![21, 23, 4]));
        let parsed: AttributeValue = serde_json::from_str("false").unwrap();
        assert_eq!(parsed, AttributeValue::Flag(false));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(serde_json::from_str::<AttributeValue>("256").is_err());
        assert!(serde_json::from_str::<AttributeValue>("-1").is_err());
        assert!(serde_json::from_str::<AttributeValue>("[1, 300]").is_err());
        assert!(serde_json::from_str::<AttributeValue>("\"on\"").is_err());
    }

    #[test]
    fn test_into_slots() {
        assert_eq!(AttributeValue::Flag(true).into_slots(), vec![1]);
        assert_eq!(AttributeValue::Flag(false).into_slots(), vec![0]);
        assert_eq!(AttributeValue::Scalar(7).into_slots(), vec![7]);
        assert_eq!(AttributeValue::List(vec![1, 2]).into_slots(), vec![1, 2]);
    }
}
