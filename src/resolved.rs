//! Resolved value types.
//!
//! A field resolves to a `TagValue`: a number for `number` fields, a
//! comma-joined string for `string`, `list` and `text` fields, a map of
//! per-key results for `map` fields, and the untouched raw value for
//! `code` fields.

use crate::numeric::format_number;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One resolved entry of a map field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapEntry {
    Number(f64),
    Text(String),
}

impl MapEntry {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MapEntry::Number(n) => Some(*n),
            MapEntry::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MapEntry::Text(s) => Some(s),
            MapEntry::Number(_) => None,
        }
    }
}

impl fmt::Display for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEntry::Number(n) => f.write_str(&format_number(*n)),
            MapEntry::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MapEntry {
    fn from(n: f64) -> Self {
        MapEntry::Number(n)
    }
}

impl From<&str> for MapEntry {
    fn from(s: &str) -> Self {
        MapEntry::Text(s.to_string())
    }
}

/// The fully aggregated value of a leaf field.
///
/// Read-only and comparable; observables diff successive values with `==`.
///
/// # Examples
///
/// ```rust
/// use zztag::TagValue;
///
/// let value = TagValue::from(1995.0);
/// assert_eq!(value.as_number(), Some(1995.0));
/// assert_eq!(value.to_string(), "1995");
///
/// let text = TagValue::from("hello,world");
/// assert_eq!(text.as_text(), Some("hello,world"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Number(f64),
    Text(String),
    Map(BTreeMap<String, MapEntry>),
    Code(Value),
}

impl TagValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MapEntry>> {
        match self {
            TagValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&Value> {
        match self {
            TagValue::Code(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Number(n) => f.write_str(&format_number(*n)),
            TagValue::Text(s) => f.write_str(s),
            TagValue::Map(map) => {
                let entries: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            TagValue::Code(Value::String(s)) => f.write_str(s),
            TagValue::Code(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for TagValue {
    fn from(n: f64) -> Self {
        TagValue::Number(n)
    }
}

impl From<i32> for TagValue {
    fn from(n: i32) -> Self {
        TagValue::Number(f64::from(n))
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Text(s)
    }
}

impl From<BTreeMap<String, MapEntry>> for TagValue {
    fn from(map: BTreeMap<String, MapEntry>) -> Self {
        TagValue::Map(map)
    }
}
