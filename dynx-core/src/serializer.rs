/// Conversion between application values and the store's native encoding
///
/// The [`Serializer`] trait is the seam the expression compiler and the batch
/// pipeline call through. [`StandardSerializer`] is the datatype-directed
/// implementation used by default.

use crate::attribute::{AttributeValue, NativeItem, NativeKey};
use crate::schema::{Datatype, TableSchema};
use crate::types::{format_timestamp, Item, Value};
use crate::{Error, Result};
use bytes::Bytes;

pub trait Serializer: Send + Sync {
    /// Build the native key for one item from its hash and optional range value
    fn build_key(&self, hash: &Value, range: Option<&Value>, schema: &TableSchema) -> Result<NativeKey>;

    /// Encode one value, guided by the attribute's declared datatype when known
    fn serialize_attribute(&self, value: &Value, datatype: Option<Datatype>) -> Result<AttributeValue>;

    /// Decode an item returned by the store
    fn deserialize_item(&self, item: &NativeItem) -> Result<Item>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSerializer;

impl StandardSerializer {
    pub fn new() -> Self {
        Self
    }

    fn untyped(&self, value: &Value) -> Result<AttributeValue> {
        Ok(match value {
            Value::Null => AttributeValue::Null(true),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::N(n) => AttributeValue::N(checked_number(n)?),
            Value::S(s) => AttributeValue::S(s.clone()),
            Value::B(b) => AttributeValue::B(b.clone()),
            Value::Date(d) => AttributeValue::S(format_timestamp(d)),
            Value::L(values) => AttributeValue::L(
                values.iter().map(|v| self.untyped(v)).collect::<Result<_>>()?,
            ),
            Value::M(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.untyped(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Value::SS(set) => AttributeValue::SS(non_empty(set.clone())?),
            Value::NS(set) => AttributeValue::NS(non_empty(
                set.iter().map(|n| checked_number(n)).collect::<Result<_>>()?,
            )?),
            Value::BS(set) => AttributeValue::BS(non_empty(set.clone())?),
        })
    }

    fn string_members(&self, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::S(s) => Ok(vec![s.clone()]),
            Value::Date(d) => Ok(vec![format_timestamp(d)]),
            Value::SS(set) => Ok(set.clone()),
            Value::L(values) => values
                .iter()
                .map(|v| match v {
                    Value::S(s) => Ok(s.clone()),
                    other => Err(mismatch(other, Datatype::StringSet)),
                })
                .collect(),
            other => Err(mismatch(other, Datatype::StringSet)),
        }
    }

    fn number_members(&self, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::N(n) => Ok(vec![checked_number(n)?]),
            Value::NS(set) => set.iter().map(|n| checked_number(n)).collect(),
            Value::L(values) => values
                .iter()
                .map(|v| match v {
                    Value::N(n) => checked_number(n),
                    other => Err(mismatch(other, Datatype::NumberSet)),
                })
                .collect(),
            other => Err(mismatch(other, Datatype::NumberSet)),
        }
    }

    fn binary_members(&self, value: &Value) -> Result<Vec<Bytes>> {
        match value {
            Value::B(b) => Ok(vec![b.clone()]),
            Value::BS(set) => Ok(set.clone()),
            Value::L(values) => values
                .iter()
                .map(|v| match v {
                    Value::B(b) => Ok(b.clone()),
                    other => Err(mismatch(other, Datatype::BinarySet)),
                })
                .collect(),
            other => Err(mismatch(other, Datatype::BinarySet)),
        }
    }
}

impl Serializer for StandardSerializer {
    fn build_key(&self, hash: &Value, range: Option<&Value>, schema: &TableSchema) -> Result<NativeKey> {
        let mut key = NativeKey::new();
        key.insert(
            schema.hash_key.clone(),
            self.serialize_attribute(hash, schema.datatype(&schema.hash_key))?,
        );

        match (&schema.range_key, range) {
            (Some(range_key), Some(range)) => {
                key.insert(
                    range_key.clone(),
                    self.serialize_attribute(range, schema.datatype(range_key))?,
                );
            }
            (Some(range_key), None) => {
                return Err(Error::InvalidArgument(format!(
                    "missing value for range key '{}'",
                    range_key
                )));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidArgument(
                    "range value given but table has no range key".into(),
                ));
            }
            (None, None) => {}
        }

        Ok(key)
    }

    fn serialize_attribute(&self, value: &Value, datatype: Option<Datatype>) -> Result<AttributeValue> {
        let datatype = match datatype {
            Some(datatype) => datatype,
            None => return self.untyped(value),
        };

        match (datatype, value) {
            (_, Value::Null) => Err(mismatch(value, datatype)),
            (Datatype::String, Value::S(s)) => Ok(AttributeValue::S(s.clone())),
            (Datatype::String, Value::N(n)) => Ok(AttributeValue::S(n.clone())),
            (Datatype::String | Datatype::Date, Value::Date(d)) => {
                Ok(AttributeValue::S(format_timestamp(d)))
            }
            (Datatype::Date, Value::S(s)) => Ok(AttributeValue::S(s.clone())),
            (Datatype::Number | Datatype::Date, Value::N(n)) => Ok(AttributeValue::N(checked_number(n)?)),
            (Datatype::Number, Value::S(s)) => Ok(AttributeValue::N(checked_number(s)?)),
            (Datatype::Binary, Value::B(b)) => Ok(AttributeValue::B(b.clone())),
            (Datatype::Binary, Value::S(s)) => Ok(AttributeValue::B(Bytes::from(s.clone().into_bytes()))),
            (Datatype::Boolean, Value::Bool(b)) => Ok(AttributeValue::Bool(*b)),
            (Datatype::StringSet, v) => Ok(AttributeValue::SS(non_empty(self.string_members(v)?)?)),
            (Datatype::NumberSet, v) => Ok(AttributeValue::NS(non_empty(self.number_members(v)?)?)),
            (Datatype::BinarySet, v) => Ok(AttributeValue::BS(non_empty(self.binary_members(v)?)?)),
            (Datatype::List, Value::L(_)) | (Datatype::Map, Value::M(_)) => self.untyped(value),
            (datatype, value) => Err(mismatch(value, datatype)),
        }
    }

    fn deserialize_item(&self, item: &NativeItem) -> Result<Item> {
        Ok(item
            .iter()
            .map(|(k, v)| (k.clone(), decode(v)))
            .collect())
    }
}

fn decode(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::S(s.clone()),
        AttributeValue::N(n) => Value::N(n.clone()),
        AttributeValue::B(b) => Value::B(b.clone()),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::L(values.iter().map(decode).collect()),
        AttributeValue::M(map) => Value::M(map.iter().map(|(k, v)| (k.clone(), decode(v))).collect()),
        AttributeValue::SS(set) => Value::SS(set.clone()),
        AttributeValue::NS(set) => Value::NS(set.clone()),
        AttributeValue::BS(set) => Value::BS(set.clone()),
    }
}

/// Finite decimal numbers only; `NaN`, `inf` and overflowing exponents are rejected
fn checked_number(n: &str) -> Result<String> {
    let text = n.trim();
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(text.to_string()),
        _ => Err(Error::Serialization(format!("'{}' is not a number", n))),
    }
}

fn non_empty<T>(set: Vec<T>) -> Result<Vec<T>> {
    if set.is_empty() {
        Err(Error::Serialization("sets must contain at least one member".into()))
    } else {
        Ok(set)
    }
}

fn mismatch(value: &Value, datatype: Datatype) -> Error {
    Error::Serialization(format!("cannot encode {:?} as {:?}", value, datatype))
}
