/// Update expression serialization
///
/// An [`UpdateItem`] lists field changes in order. Each change is classified
/// into one of the four action clauses and rendered with name and value
/// placeholders. Key attributes are never part of an update expression.

use super::placeholder::{name_placeholder, unique_name_placeholder, unique_value_name};
use super::ActionKeyword;
use crate::attribute::AttributeValue;
use crate::schema::TableSchema;
use crate::serializer::Serializer;
use crate::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// One field change, decided at the API boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateValue {
    /// Overwrite the attribute. `Null` and the empty string remove it instead.
    Set(Value),
    /// Add to a number, or add members to a set
    Increment(Value),
    /// Remove members from a set
    Decrement(Value),
    /// Remove the attribute
    Remove,
}

impl UpdateValue {
    fn classify(&self) -> (ActionKeyword, Option<&Value>) {
        match self {
            UpdateValue::Remove => (ActionKeyword::Remove, None),
            UpdateValue::Set(v) if v.is_null() || v.is_empty_string() => (ActionKeyword::Remove, None),
            UpdateValue::Set(v) => (ActionKeyword::Set, Some(v)),
            UpdateValue::Increment(v) => (ActionKeyword::Add, Some(v)),
            UpdateValue::Decrement(v) => (ActionKeyword::Delete, Some(v)),
        }
    }
}

impl From<Value> for UpdateValue {
    fn from(value: Value) -> Self {
        UpdateValue::Set(value)
    }
}

/// Ordered set of field changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    fields: Vec<(String, UpdateValue)>,
}

impl UpdateItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; a second change to the same field replaces the first in place
    pub fn field(mut self, name: impl Into<String>, value: impl Into<UpdateValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn set(self, name: impl Into<String>, value: Value) -> Self {
        self.field(name, UpdateValue::Set(value))
    }

    pub fn increment(self, name: impl Into<String>, value: Value) -> Self {
        self.field(name, UpdateValue::Increment(value))
    }

    pub fn decrement(self, name: impl Into<String>, value: Value) -> Self {
        self.field(name, UpdateValue::Decrement(value))
    }

    pub fn remove(self, name: impl Into<String>) -> Self {
        self.field(name, UpdateValue::Remove)
    }

    pub fn fields(&self) -> &[(String, UpdateValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<UpdateValue>> FromIterator<(K, V)> for UpdateItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(UpdateItem::new(), |item, (k, v)| item.field(k, v))
    }
}

/// Compiled update expression: one operand list per action keyword
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    pub set: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub delete: Vec<String>,
    pub attribute_names: HashMap<String, String>,
    pub attribute_values: HashMap<String, AttributeValue>,
}

impl UpdateExpression {
    pub fn operands(&self, keyword: ActionKeyword) -> &[String] {
        match keyword {
            ActionKeyword::Set => &self.set,
            ActionKeyword::Add => &self.add,
            ActionKeyword::Remove => &self.remove,
            ActionKeyword::Delete => &self.delete,
        }
    }

    fn operands_mut(&mut self, keyword: ActionKeyword) -> &mut Vec<String> {
        match keyword {
            ActionKeyword::Set => &mut self.set,
            ActionKeyword::Add => &mut self.add,
            ActionKeyword::Remove => &mut self.remove,
            ActionKeyword::Delete => &mut self.delete,
        }
    }

    /// Render the full expression text
    pub fn statement(&self) -> String {
        stringify(ActionKeyword::ALL.into_iter().map(|k| (k, self.operands(k))))
    }

    pub fn is_empty(&self) -> bool {
        ActionKeyword::ALL.into_iter().all(|k| self.operands(k).is_empty())
    }
}

/// Join clauses as `KEYWORD a, b` separated by single spaces, skipping empty ones
pub fn stringify<'a, I>(clauses: I) -> String
where
    I: IntoIterator<Item = (ActionKeyword, &'a [String])>,
{
    clauses
        .into_iter()
        .filter(|(_, operands)| !operands.is_empty())
        .map(|(keyword, operands)| format!("{} {}", keyword, operands.join(", ")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compile `item` into an update expression for a table with `schema`
pub fn serialize_update_expression<S>(
    schema: &TableSchema,
    item: &UpdateItem,
    serializer: &S,
) -> Result<UpdateExpression>
where
    S: Serializer + ?Sized,
{
    let mut expr = UpdateExpression::default();
    let mut value_names: HashSet<String> = HashSet::new();

    for (field, change) in item.fields() {
        if schema.is_key(field) {
            trace!(field = %field, "skipping key attribute in update");
            continue;
        }

        if name_placeholder(field) == "#" {
            return Err(Error::InvalidArgument(format!(
                "attribute name '{}' has no word characters",
                field
            )));
        }

        let name_key = unique_name_placeholder(field, &expr.attribute_names);
        let (keyword, value) = change.classify();

        let operand = match value {
            None => name_key.clone(),
            Some(value) => {
                let value_key = unique_value_name(field, &value_names);
                let encoded = serializer.serialize_attribute(value, schema.datatype(field))?;
                value_names.insert(value_key.clone());
                expr.attribute_values.insert(value_key.clone(), encoded);

                match keyword {
                    ActionKeyword::Set => format!("{} = {}", name_key, value_key),
                    _ => format!("{} {}", name_key, value_key),
                }
            }
        };

        expr.attribute_names.insert(name_key, field.clone());
        expr.operands_mut(keyword).push(operand);
    }

    trace!(statement = %expr.statement(), "compiled update expression");
    Ok(expr)
}
