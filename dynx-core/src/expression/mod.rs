/// Expression compiler for update, filter and condition expressions
///
/// Turns declarative intent into placeholder-safe expression text plus the
/// attribute-name and attribute-value tables the store expects alongside it.
///
/// # Update Expression Example
///
/// ```
/// use dynx_core::expression::{serialize_update_expression, UpdateItem};
/// use dynx_core::{Datatype, StandardSerializer, TableSchema, Value};
///
/// let schema = TableSchema::new("id", Datatype::String).with_attribute("score", Datatype::Number);
/// let item = UpdateItem::new()
///     .set("name", Value::string("x"))
///     .increment("score", Value::number(5));
///
/// let expr = serialize_update_expression(&schema, &item, &StandardSerializer).unwrap();
/// assert_eq!(expr.statement(), "SET #name = :name ADD #score :score");
/// ```
///
/// # Filter Expression Example
///
/// ```
/// use dynx_core::expression::{build_filter_expression, Operator};
/// use dynx_core::Value;
///
/// let expr = build_filter_expression("age", Operator::Gt, &[], Some(Value::number(21)), None).unwrap();
/// assert_eq!(expr.statement, "#age > :age");
/// ```

use crate::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod condition;
pub mod filter;
pub mod parser;
pub mod placeholder;
pub mod update;

pub use condition::ConditionBuilder;
pub use filter::{build_filter_expression, Operator};
pub use parser::{parse_update_expression, ParsedUpdateExpression};
pub use placeholder::{name_placeholder, path_placeholders, unique_value_name, PathPlaceholders};
pub use update::{serialize_update_expression, stringify, UpdateExpression, UpdateItem, UpdateValue};

/// Update action keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKeyword {
    Set,
    Add,
    Remove,
    Delete,
}

impl ActionKeyword {
    /// Rendering order of clauses in an update expression
    pub const ALL: [ActionKeyword; 4] = [
        ActionKeyword::Set,
        ActionKeyword::Add,
        ActionKeyword::Remove,
        ActionKeyword::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKeyword::Set => "SET",
            ActionKeyword::Add => "ADD",
            ActionKeyword::Remove => "REMOVE",
            ActionKeyword::Delete => "DELETE",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        ActionKeyword::ALL.into_iter().find(|k| k.as_str() == word)
    }
}

impl fmt::Display for ActionKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled filter or condition expression
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Expression {
    /// Expression text referencing placeholders only
    pub statement: String,
    /// Name placeholder (`#field`) -> real attribute name
    pub attribute_names: HashMap<String, String>,
    /// Value placeholder (`:field`) -> literal value
    pub attribute_values: HashMap<String, Value>,
}

impl Expression {
    /// Value placeholders minted by this expression, sorted
    pub fn value_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attribute_values.keys().cloned().collect();
        names.sort();
        names
    }

    /// Combine two fragments with `AND`.
    ///
    /// Fails if the fragments bind the same placeholder to different names or values.
    pub fn and(mut self, other: Expression) -> Result<Expression> {
        merge_names(&mut self.attribute_names, other.attribute_names)?;

        for (placeholder, value) in other.attribute_values {
            match self.attribute_values.get(&placeholder) {
                Some(existing) if *existing != value => {
                    return Err(Error::InvalidExpression(format!(
                        "value placeholder {} bound to two different values",
                        placeholder
                    )));
                }
                _ => {
                    self.attribute_values.insert(placeholder, value);
                }
            }
        }

        self.statement = match (self.statement.is_empty(), other.statement.is_empty()) {
            (true, _) => other.statement,
            (false, true) => self.statement,
            (false, false) => format!("{} AND {}", self.statement, other.statement),
        };

        Ok(self)
    }
}

pub(crate) fn merge_names(
    into: &mut HashMap<String, String>,
    from: HashMap<String, String>,
) -> Result<()> {
    for (placeholder, name) in from {
        match into.get(&placeholder) {
            Some(existing) if *existing != name => {
                return Err(Error::InvalidExpression(format!(
                    "name placeholder {} bound to both '{}' and '{}'",
                    placeholder, existing, name
                )));
            }
            _ => {
                into.insert(placeholder, name);
            }
        }
    }
    Ok(())
}
