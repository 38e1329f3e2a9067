//! Field values - the dynamically shaped content of entry fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A field value as found in an entry record
///
/// Entry files are hand-edited and machine-extracted, so a field may hold
/// any YAML shape. Unknown shapes are kept as-is rather than rejected.
///
/// # Examples
///
/// ```
/// use concord_domain::FieldValue;
///
/// let v = FieldValue::from("  Stops a COG. ");
/// assert_eq!(v.normalized(), "stops a cog.");
///
/// let list = FieldValue::List(vec!["MOV".into(), "ADD".into()]);
/// assert_eq!(list.to_string(), "MOV, ADD");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit null / empty value
    Null,

    /// Boolean value
    Bool(bool),

    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Free text
    Text(String),

    /// Sequence of values
    List(Vec<FieldValue>),

    /// Nested mapping
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Whether this value is null or an empty string/list/map
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Borrow the text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the items, if this is a list value
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Canonical comparison form: trimmed, lower-cased display string
    pub fn normalized(&self) -> String {
        self.to_string().trim().to_lowercase()
    }

    /// Reference-like items of this value
    ///
    /// Lists yield one item per element; text is split on commas.
    /// Other shapes yield nothing.
    pub fn items(&self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items
                .iter()
                .map(|item| item.to_string().trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            FieldValue::Text(s) => s
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            FieldValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items)
    }
}
