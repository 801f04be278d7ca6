//! Raw datapoint values as reported by the door controller.
//!
//! A datapoint (DP) is a single addressable property on the controller,
//! identified by a small numeric string key. Vendors disagree on encodings,
//! so values stay untyped here and are interpreted by the door translators.

use crate::error::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw datapoint value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl DpValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DpValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DpValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, accepting numeric strings and whole floats.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DpValue::Integer(i) => Some(*i),
            DpValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            DpValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert a JSON value, rejecting null, arrays and objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(DpValue::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(DpValue::Integer)
                .or_else(|| n.as_f64().map(DpValue::Float)),
            serde_json::Value::String(s) => Some(DpValue::String(s)),
            _ => None,
        }
    }
}

impl fmt::Display for DpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpValue::Bool(b) => write!(f, "{}", b),
            DpValue::Integer(i) => write!(f, "{}", i),
            DpValue::Float(x) => write!(f, "{}", x),
            DpValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for DpValue {
    fn from(value: bool) -> Self {
        DpValue::Bool(value)
    }
}

impl From<i64> for DpValue {
    fn from(value: i64) -> Self {
        DpValue::Integer(value)
    }
}

impl From<&str> for DpValue {
    fn from(value: &str) -> Self {
        DpValue::String(value.to_string())
    }
}

impl From<String> for DpValue {
    fn from(value: String) -> Self {
        DpValue::String(value)
    }
}

/// One batch of datapoint changes, keyed by datapoint id.
pub type DpChanges = BTreeMap<String, DpValue>;

/// Parse a JSON object payload (`{"101": "opening", "12": "none"}`) into a batch.
///
/// Entries with unsupported JSON types are dropped with a warning so one bad
/// datapoint does not discard the rest of the report.
pub fn parse_changes(payload: &str) -> Result<DpChanges> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(payload)?;

    let mut changes = DpChanges::new();
    for (dp, value) in raw {
        match DpValue::from_json(value) {
            Some(v) => {
                changes.insert(dp, v);
            }
            None => warn!("Ignoring datapoint {} with unsupported value type", dp),
        }
    }
    Ok(changes)
}

/// Render a batch as a compact JSON object for logging and publishing.
pub fn changes_to_json(changes: &DpChanges) -> String {
    serde_json::to_string(changes).unwrap_or_else(|_| format!("{:?}", changes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_changes_mixed_types() {
        let changes =
            parse_changes(r#"{"1": true, "12": "none", "103": 25, "9": null, "10": [1]}"#).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes["1"], DpValue::Bool(true));
        assert_eq!(changes["12"], DpValue::String("none".into()));
        assert_eq!(changes["103"], DpValue::Integer(25));
        assert!(!changes.contains_key("9"));
    }

    #[test]
    fn test_parse_changes_rejects_non_object() {
        assert!(parse_changes("[1, 2]").is_err());
        assert!(parse_changes("not json").is_err());
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(DpValue::Integer(30).as_integer(), Some(30));
        assert_eq!(DpValue::from(" 45 ").as_integer(), Some(45));
        assert_eq!(DpValue::Float(12.0).as_integer(), Some(12));
        assert_eq!(DpValue::Float(12.5).as_integer(), None);
        assert_eq!(DpValue::from("fast").as_integer(), None);
        assert_eq!(DpValue::Bool(true).as_integer(), None);
    }

    #[test]
    fn test_changes_to_json() {
        let mut changes = DpChanges::new();
        changes.insert("101".into(), "open".into());
        assert_eq!(changes_to_json(&changes), r#"{"101":"open"}"#);
    }
}
