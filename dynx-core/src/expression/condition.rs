/// AND-composition of filter fragments
///
/// Every fragment is compiled against the placeholders already minted by the
/// builder, so conditions on the same attribute never share a value
/// placeholder.

use super::filter::{compile, Operator};
use super::{merge_names, Expression};
use crate::{Result, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    fragments: Vec<String>,
    attribute_names: HashMap<String, String>,
    attribute_values: HashMap<String, Value>,
    reserved: HashSet<String>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep value placeholders clear of names used elsewhere in the request,
    /// e.g. by a key condition that is sent alongside the filter.
    pub fn reserve_value_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add a condition with explicit operands
    pub fn condition(
        mut self,
        path: &str,
        operator: Operator,
        value: Option<Value>,
        value2: Option<Value>,
    ) -> Result<Self> {
        let taken: HashSet<String> = self
            .reserved
            .iter()
            .chain(self.attribute_values.keys())
            .cloned()
            .collect();

        let fragment = compile(path, operator, &taken, &self.attribute_names, value, value2)?;

        merge_names(&mut self.attribute_names, fragment.attribute_names)?;
        self.attribute_values.extend(fragment.attribute_values);
        self.fragments.push(fragment.statement);
        Ok(self)
    }

    /// `path <op> value` for the comparison operators
    pub fn compare(self, path: &str, operator: Operator, value: impl Into<Value>) -> Result<Self> {
        self.condition(path, operator, Some(value.into()), None)
    }

    pub fn between(self, path: &str, low: impl Into<Value>, high: impl Into<Value>) -> Result<Self> {
        self.condition(path, Operator::Between, Some(low.into()), Some(high.into()))
    }

    pub fn is_in<I>(self, path: &str, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = Value::list(values.into_iter().map(Into::into));
        self.condition(path, Operator::In, Some(values), None)
    }

    pub fn exists(self, path: &str) -> Result<Self> {
        self.condition(path, Operator::AttributeExists, None, None)
    }

    pub fn not_exists(self, path: &str) -> Result<Self> {
        self.condition(path, Operator::AttributeNotExists, None, None)
    }

    pub fn begins_with(self, path: &str, prefix: impl Into<Value>) -> Result<Self> {
        self.condition(path, Operator::BeginsWith, Some(prefix.into()), None)
    }

    pub fn contains(self, path: &str, operand: impl Into<Value>) -> Result<Self> {
        self.condition(path, Operator::Contains, Some(operand.into()), None)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// All conditions joined with `AND`; `None` if none were added
    pub fn build(self) -> Option<Expression> {
        if self.fragments.is_empty() {
            return None;
        }

        Some(Expression {
            statement: self.fragments.join(" AND "),
            attribute_names: self.attribute_names,
            attribute_values: self.attribute_values,
        })
    }
}
