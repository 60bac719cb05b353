/// Table descriptor and item construction

use dynx_core::{Item, Result, TableSchema};
use std::sync::Arc;

/// A table as seen by the batch pipeline: wire name, schema, and how returned
/// items become domain objects.
pub trait Table: Send + Sync {
    type Model: Send;

    fn table_name(&self) -> &str;

    fn schema(&self) -> &TableSchema;

    /// Build a domain object from a decoded item
    fn init_item(&self, item: Item) -> Result<Self::Model>;
}

impl<T: Table + ?Sized> Table for Arc<T> {
    type Model = T::Model;

    fn table_name(&self) -> &str {
        (**self).table_name()
    }

    fn schema(&self) -> &TableSchema {
        (**self).schema()
    }

    fn init_item(&self, item: Item) -> Result<Self::Model> {
        (**self).init_item(item)
    }
}

/// Plain table whose items are returned as decoded [`Item`] maps
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    name: String,
    schema: TableSchema,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

impl Table for TableDescriptor {
    type Model = Item;

    fn table_name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn init_item(&self, item: Item) -> Result<Item> {
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynx_core::{Datatype, Value};

    #[test]
    fn test_descriptor() {
        let table = TableDescriptor::new("users", TableSchema::new("id", Datatype::String));
        assert_eq!(table.table_name(), "users");
        assert!(table.schema().is_key("id"));

        let mut item = Item::new();
        item.insert("id".into(), Value::string("u1"));
        assert_eq!(table.init_item(item.clone()).unwrap(), item);
    }

    #[test]
    fn test_arc_table() {
        let table = Arc::new(TableDescriptor::new("users", TableSchema::new("id", Datatype::String)));
        assert_eq!(Table::table_name(&table), "users");
    }
}
