//! Setting values.

use plist::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single setting value inside a unit.
///
/// The value space is deliberately closed: everything a unit setting can
/// hold maps onto one of these variants and onto a property-list primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// Text.
    String(String),
    /// Ordered list of strings.
    StringList(Vec<String>),
}

/// Kind of a [`SettingValue`], used by unit definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`SettingValue::Bool`].
    Bool,
    /// [`SettingValue::Integer`].
    Integer,
    /// [`SettingValue::Real`].
    Real,
    /// [`SettingValue::String`].
    String,
    /// [`SettingValue::StringList`].
    StringList,
}

impl SettingValue {
    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Integer(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::String(_) => ValueKind::String,
            Self::StringList(_) => ValueKind::StringList,
        }
    }

    /// Returns `true` for blank strings and empty lists.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::String(s) => s.trim().is_empty(),
            Self::StringList(items) => items.is_empty(),
            Self::Bool(_) | Self::Integer(_) | Self::Real(_) => false,
        }
    }

    /// Returns the string if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts to a property-list value.
    #[must_use]
    pub fn to_plist(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Boolean(*b),
            Self::Integer(i) => Value::Integer((*i).into()),
            Self::Real(r) => Value::Real(*r),
            Self::String(s) => Value::String(s.clone()),
            Self::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Converts from a property-list value.
    ///
    /// Returns `None` for shapes outside the supported value space
    /// (dictionaries, data, dates, mixed arrays).
    #[must_use]
    pub fn from_plist(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(Self::Bool(*b)),
            Value::Integer(i) => i.as_signed().map(Self::Integer),
            Value::Real(r) => Some(Self::Real(*r)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_string().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::StringList),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::String(s) => write!(f, "{s}"),
            Self::StringList(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_json_untagged_kinds() {
        let values: Vec<SettingValue> =
            serde_json::from_str(r#"[true, 3, 2.5, "x", ["a", "b"]]"#).unwrap();
        let kinds: Vec<ValueKind> = values.iter().map(SettingValue::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ValueKind::Bool,
                ValueKind::Integer,
                ValueKind::Real,
                ValueKind::String,
                ValueKind::StringList
            ]
        );
    }

    #[test]
    fn test_plist_conversion() {
        let list = SettingValue::StringList(vec!["a".into(), "b".into()]);
        assert_eq!(SettingValue::from_plist(&list.to_plist()), Some(list));
        assert_eq!(
            SettingValue::from_plist(&SettingValue::Integer(-7).to_plist()),
            Some(SettingValue::Integer(-7))
        );
    }

    #[test]
    fn test_unsupported_plist_shapes() {
        assert_eq!(
            SettingValue::from_plist(&Value::Dictionary(plist::Dictionary::new())),
            None
        );
        assert_eq!(
            SettingValue::from_plist(&Value::Array(vec![Value::Boolean(true)])),
            None
        );
    }

    #[test]
    fn test_blank() {
        assert!(SettingValue::from("  ").is_blank());
        assert!(SettingValue::StringList(Vec::new()).is_blank());
        assert!(!SettingValue::Bool(false).is_blank());
    }

    #[test]
    fn test_display() {
        assert_eq!(SettingValue::from(vec!["a".to_string()]).to_string(), "[a]");
        assert_eq!(SettingValue::Real(1.5).to_string(), "1.5");
    }
}
