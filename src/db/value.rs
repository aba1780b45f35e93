//! The closed set of values that cross between scripts and drivers.
//!
//! `ScriptValue` is what drivers bind and what decoded result cells become.
//! Host-side values (`crate::module::HostValue`) are converted into it at the
//! facade boundary, so drivers never see arrays, objects or functions.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// Largest integer a script number (an IEEE-754 double) represents exactly.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Smallest integer a script number represents exactly.
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// A value that can be bound as a parameter or read back from a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
}

impl ScriptValue {
    /// Kind name used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Int(_) => "integer",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Bytes(_) => "bytes",
            ScriptValue::DateTime(_) => "datetime",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view. Floats are only accepted when they are integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            ScriptValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScriptValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ScriptValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// True when an integer cannot be handed to a script as a plain number
    /// without losing precision.
    pub fn exceeds_safe_integer(&self) -> bool {
        matches!(self, ScriptValue::Int(i) if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(i))
    }
}

/// Canonical text form of a timestamp, as stored by text-only engines.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{}", b),
            ScriptValue::Int(i) => write!(f, "{}", i),
            ScriptValue::Float(x) => write!(f, "{}", x),
            ScriptValue::String(s) => write!(f, "{}", s),
            ScriptValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            ScriptValue::DateTime(dt) => write!(f, "{}", format_timestamp(dt)),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        ScriptValue::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(b: Vec<u8>) -> Self {
        ScriptValue::Bytes(b)
    }
}

impl From<DateTime<Utc>> for ScriptValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ScriptValue::DateTime(dt)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ScriptValue::Null)
    }
}
