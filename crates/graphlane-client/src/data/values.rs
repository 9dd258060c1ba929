//! Typed property values accepted by the insert pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single property value.
///
/// Every variant is owned data; the codec decides per declared property type
/// which variants it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    /// Explicit absence. Never encoded; the codec rejects it.
    Null,
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Calendar date and time without a zone
    Datetime(NaiveDateTime),
    /// Instant, stored on the wire as whole seconds since the epoch
    Timestamp(DateTime<Utc>),
}

impl PropertyValue {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Int32(_) => "int32",
            PropertyValue::Int64(_) => "int64",
            PropertyValue::UInt32(_) => "uint32",
            PropertyValue::UInt64(_) => "uint64",
            PropertyValue::Float(_) => "float",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
            PropertyValue::Datetime(_) => "datetime",
            PropertyValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Int32(v) => write!(f, "{v}"),
            PropertyValue::Int64(v) => write!(f, "{v}"),
            PropertyValue::UInt32(v) => write!(f, "{v}"),
            PropertyValue::UInt64(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Datetime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.6f")),
            PropertyValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(v: $ty) -> Self {
                    PropertyValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    NaiveDateTime => Datetime,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PropertyValue::Null, Into::into)
    }
}

/// Property name to value map carried by a row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, PropertyValue>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Sets a value, returning the previous one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_conversions() {
        assert_eq!(PropertyValue::from(7i32), PropertyValue::Int32(7));
        assert_eq!(PropertyValue::from("bob"), PropertyValue::String("bob".into()));
        assert_eq!(PropertyValue::from(None::<i64>), PropertyValue::Null);
        assert_eq!(PropertyValue::from(Some(1.5f64)), PropertyValue::Double(1.5));
    }

    #[test]
    fn test_display_datetime() {
        let dt = NaiveDate::from_ymd_opt(2021, 3, 4)
            .and_then(|d| d.and_hms_micro_opt(5, 6, 7, 8))
            .unwrap();
        assert_eq!(PropertyValue::Datetime(dt).to_string(), "2021-03-04 05:06:07.000008");
    }

    #[test]
    fn test_tagged_json() {
        let json = serde_json::to_value(PropertyValue::Int64(42)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Int64", "value": 42}));

        let values: Values = serde_json::from_str(r#"{"name": {"type": "String", "value": "ada"}}"#).unwrap();
        assert_eq!(values.get("name"), Some(&PropertyValue::from("ada")));
    }

    #[test]
    fn test_values_map() {
        let mut values: Values = [("name", "alice")].into_iter().collect();
        assert!(values.contains("name"));
        assert_eq!(values.set("age", 30i32), None);
        assert_eq!(values.len(), 2);
        assert_eq!(values.remove("name"), Some(PropertyValue::from("alice")));
        assert!(!values.contains("name"));
    }
}
