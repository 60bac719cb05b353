use chrono::{DateTime, Utc};
use dynx_core::{Item, Value};
use std::collections::HashMap;

pub use dynx_core::{Error as DynxError, Value as DynxValue};

pub mod batch;
pub use batch::{
    buckets, BatchGetOptions, BatchGetRequest, BatchGetResponse, BatchGetter, KeysAndAttributes,
};

pub mod table;
pub use table::{Table, TableDescriptor};

pub mod transport;
pub use transport::BatchTransport;

/// Helper to build items
pub struct ItemBuilder {
    item: HashMap<String, Value>,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self {
            item: HashMap::new(),
        }
    }

    pub fn string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.item.insert(key.into(), Value::string(value.into()));
        self
    }

    pub fn number(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.item.insert(key.into(), Value::number(value));
        self
    }

    pub fn bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.item.insert(key.into(), Value::Bool(value));
        self
    }

    pub fn date(mut self, key: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.item.insert(key.into(), Value::date(value));
        self
    }

    /// Explicit null; in an update this removes the attribute
    pub fn null(mut self, key: impl Into<String>) -> Self {
        self.item.insert(key.into(), Value::Null);
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.item.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Item {
        self.item
    }
}

impl Default for ItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
