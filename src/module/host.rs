//! Values as the scripting host marshals them.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::db::value::{format_timestamp, MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};

use super::Handle;

/// A script-side value crossing into or out of the module.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    /// Script number (IEEE-754 double).
    Number(f64),
    BigInt(i64),
    String(String),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Array(Vec<HostValue>),
    /// Insertion-ordered record.
    Object(IndexMap<String, HostValue>),
    Function,
    Handle(Handle),
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::BigInt(_) => "bigint",
            HostValue::String(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Date(_) => "date",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Function => "function",
            HostValue::Handle(_) => "handle",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            HostValue::Handle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, HostValue>> {
        match self {
            HostValue::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field of an object value.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Convert a JSON literal. Integers beyond the safe range become bigints.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) => HostValue::BigInt(i),
                _ => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => HostValue::Array(items.into_iter().map(Self::from_json).collect()),
            serde_json::Value::Object(fields) => {
                HostValue::Object(fields.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<Handle> for HostValue {
    fn from(h: Handle) -> Self {
        HostValue::Handle(h)
    }
}

/// JSON rendering used by the CLI output formats. Integral numbers print
/// without a fraction, bytes as hex, dates as RFC 3339.
impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HostValue::Undefined | HostValue::Null | HostValue::Function => serializer.serialize_none(),
            HostValue::Bool(b) => serializer.serialize_bool(*b),
            HostValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 => {
                serializer.serialize_i64(*n as i64)
            }
            HostValue::Number(n) => serializer.serialize_f64(*n),
            HostValue::BigInt(i) => serializer.serialize_i64(*i),
            HostValue::String(s) => serializer.serialize_str(s),
            HostValue::Bytes(b) => serializer.serialize_str(&hex::encode(b)),
            HostValue::Date(dt) => serializer.serialize_str(&format_timestamp(dt)),
            HostValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            HostValue::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            HostValue::Handle(h) => serializer.serialize_str(&h.to_string()),
        }
    }
}
