use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Application-level value, before encoding for the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null (also used as "remove this attribute" in updates)
    Null,
    /// Boolean
    Bool(bool),
    /// Number (stored as string for precision)
    N(String),
    /// String
    S(String),
    /// Binary
    B(Bytes),
    /// Point in time, sent to the store as an ISO-8601 string
    Date(DateTime<Utc>),
    /// List
    L(Vec<Value>),
    /// Map
    M(HashMap<String, Value>),
    /// String set
    SS(Vec<String>),
    /// Number set
    NS(Vec<String>),
    /// Binary set
    BS(Vec<Bytes>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::S(s.into())
    }

    pub fn number(n: impl ToString) -> Self {
        Value::N(n.to_string())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Value::B(b.into())
    }

    pub fn date(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::L(values.into_iter().collect())
    }

    pub fn map(m: HashMap<String, Value>) -> Self {
        Value::M(m)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::L(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_empty_string(&self) -> bool {
        matches!(self, Value::S(s) if s.is_empty())
    }

    /// Replace dates with their canonical textual form; everything else is returned unchanged.
    pub fn normalized(self) -> Value {
        match self {
            Value::Date(d) => Value::S(format_timestamp(&d)),
            other => other,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::S(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::S(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::number(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

/// Canonical timestamp text: UTC, millisecond precision, `Z` suffix.
pub fn format_timestamp(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Item - a map of attribute names to values
pub type Item = HashMap<String, Value>;

/// Application key for one item: hash value plus optional range value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub hash: Value,
    pub range: Option<Value>,
}

impl KeyRecord {
    pub fn new(hash: impl Into<Value>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    pub fn with_range(hash: impl Into<Value>, range: impl Into<Value>) -> Self {
        Self {
            hash: hash.into(),
            range: Some(range.into()),
        }
    }
}

impl From<&str> for KeyRecord {
    fn from(hash: &str) -> Self {
        KeyRecord::new(hash)
    }
}

impl From<String> for KeyRecord {
    fn from(hash: String) -> Self {
        KeyRecord::new(hash)
    }
}

impl From<i64> for KeyRecord {
    fn from(hash: i64) -> Self {
        KeyRecord::new(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_types() {
        let s = Value::string("hello");
        assert_eq!(s.as_string(), Some("hello"));
        assert!(Value::Null.is_null());
        assert!(Value::string("").is_empty_string());
        assert!(!Value::string(" ").is_empty_string());
        assert!(!Value::number(0).is_empty_string());
    }

    #[test]
    fn test_date_normalization() {
        let d = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Value::date(d).normalized(),
            Value::string("2021-01-01T00:00:00.000Z")
        );

        // Non-date values pass through
        assert_eq!(Value::number(21).normalized(), Value::number(21));
    }

    #[test]
    fn test_key_record() {
        let key = KeyRecord::with_range("user#1", 42i64);
        assert_eq!(key.hash, Value::string("user#1"));
        assert_eq!(key.range, Some(Value::number(42)));

        let key: KeyRecord = "user#2".into();
        assert!(key.range.is_none());
    }
}
