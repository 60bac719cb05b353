/// Table schema: key attribute names and declared attribute datatypes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared datatype of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    String,
    Number,
    Binary,
    Boolean,
    Date,
    StringSet,
    NumberSet,
    BinarySet,
    List,
    Map,
}

impl Datatype {
    pub fn is_set(&self) -> bool {
        matches!(self, Datatype::StringSet | Datatype::NumberSet | Datatype::BinarySet)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub hash_key: String,
    pub range_key: Option<String>,
    pub datatypes: HashMap<String, Datatype>,
}

impl TableSchema {
    /// Create a schema with a hash key of the given datatype
    pub fn new(hash_key: impl Into<String>, datatype: Datatype) -> Self {
        let hash_key = hash_key.into();
        let mut datatypes = HashMap::new();
        datatypes.insert(hash_key.clone(), datatype);
        Self {
            hash_key,
            range_key: None,
            datatypes,
        }
    }

    pub fn with_range_key(mut self, range_key: impl Into<String>, datatype: Datatype) -> Self {
        let range_key = range_key.into();
        self.datatypes.insert(range_key.clone(), datatype);
        self.range_key = Some(range_key);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, datatype: Datatype) -> Self {
        self.datatypes.insert(name.into(), datatype);
        self
    }

    /// True if `field` is the hash or range key
    pub fn is_key(&self, field: &str) -> bool {
        self.hash_key == field || self.range_key.as_deref() == Some(field)
    }

    pub fn datatype(&self, field: &str) -> Option<Datatype> {
        self.datatypes.get(field).copied()
    }
}
