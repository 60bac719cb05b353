/// Filter and condition expression fragments
///
/// Each call compiles one `path operator operand(s)` condition into an
/// [`Expression`]. Value placeholders avoid every name in
/// `existing_value_names`, so fragments built one after another can be joined
/// into a single expression.

use super::placeholder::{path_placeholders, unique_value_name};
use super::{merge_names, Expression};
use crate::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    In,
    AttributeExists,
    AttributeNotExists,
    AttributeType,
    BeginsWith,
    Contains,
    NotContains,
    Size,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::AttributeExists => "attribute_exists",
            Operator::AttributeNotExists => "attribute_not_exists",
            Operator::AttributeType => "attribute_type",
            Operator::BeginsWith => "begins_with",
            Operator::Contains => "contains",
            Operator::NotContains => "NOT contains",
            Operator::Size => "size",
        }
    }

    /// Rendered as a call: `operator(path[, value])`
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            Operator::AttributeExists
                | Operator::AttributeNotExists
                | Operator::AttributeType
                | Operator::BeginsWith
                | Operator::Contains
                | Operator::NotContains
                | Operator::Size
        )
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.trim() {
            "=" => Operator::Eq,
            "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "BETWEEN" => Operator::Between,
            "IN" => Operator::In,
            "attribute_exists" => Operator::AttributeExists,
            "attribute_not_exists" => Operator::AttributeNotExists,
            "attribute_type" => Operator::AttributeType,
            "begins_with" => Operator::BeginsWith,
            "contains" => Operator::Contains,
            "NOT contains" => Operator::NotContains,
            "size" => Operator::Size,
            other => return Err(Error::UnsupportedOperator(other.to_string())),
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile one condition on `path`.
///
/// `value2` is only meaningful for `BETWEEN`; `IN` takes its candidates as a
/// `Value::L` in `value`. Dates are normalized to their canonical text form.
pub fn build_filter_expression(
    path: &str,
    operator: Operator,
    existing_value_names: &[String],
    value: Option<Value>,
    value2: Option<Value>,
) -> Result<Expression> {
    let existing: HashSet<String> = existing_value_names.iter().cloned().collect();
    compile(path, operator, &existing, &HashMap::new(), value, value2)
}

/// Same as [`build_filter_expression`], but also keeps name placeholders clear
/// of attributes already registered in `existing_names`.
pub(crate) fn compile(
    path: &str,
    operator: Operator,
    existing_values: &HashSet<String>,
    existing_names: &HashMap<String, String>,
    value: Option<Value>,
    value2: Option<Value>,
) -> Result<Expression> {
    if operator == Operator::In {
        if value2.is_some() {
            return Err(Error::InvalidArgument("IN takes a single list operand".into()));
        }
        return compile_in(path, existing_values, existing_names, value);
    }

    let mut operator = operator;
    let mut v1 = value.map(Value::normalized);
    let v2 = value2.map(Value::normalized);

    if operator == Operator::AttributeExists {
        match v1 {
            Some(Value::Bool(false)) => {
                operator = Operator::AttributeNotExists;
                v1 = None;
            }
            Some(Value::Bool(true)) => v1 = None,
            _ => {}
        }
    }

    check_operands(operator, &v1, &v2)?;

    let placeholders = path_placeholders(path, existing_names)?;
    let target = &placeholders.expression;

    let v1_name = unique_value_name(path, existing_values);
    let mut taken = existing_values.clone();
    taken.insert(v1_name.clone());
    let v2_name = unique_value_name(path, &taken);

    let statement = if operator.is_function() {
        match v1 {
            Some(_) => format!("{}({}, {})", operator, target, v1_name),
            None => format!("{}({})", operator, target),
        }
    } else if operator == Operator::Between {
        format!("{} BETWEEN {} AND {}", target, v1_name, v2_name)
    } else {
        format!("{} {} {}", target, operator, v1_name)
    };

    let mut attribute_values = HashMap::new();
    if let Some(v) = v1 {
        attribute_values.insert(v1_name, v);
    }
    if let Some(v) = v2 {
        attribute_values.insert(v2_name, v);
    }

    let mut attribute_names = HashMap::new();
    merge_names(&mut attribute_names, placeholders.names.into_iter().collect())?;

    trace!(statement = %statement, "compiled filter expression");
    Ok(Expression {
        statement,
        attribute_names,
        attribute_values,
    })
}

fn check_operands(operator: Operator, v1: &Option<Value>, v2: &Option<Value>) -> Result<()> {
    let missing = |what: &str| {
        Err(Error::InvalidArgument(format!(
            "operator {} requires {}",
            operator, what
        )))
    };

    match operator {
        Operator::Between => {
            if v1.is_none() || v2.is_none() {
                return missing("two values");
            }
        }
        Operator::AttributeExists | Operator::AttributeNotExists => {
            if v1.is_some() {
                return Err(Error::InvalidArgument(format!(
                    "operator {} takes no value",
                    operator
                )));
            }
        }
        op if op.is_function() => {}
        _ => {
            if v1.is_none() {
                return missing("a value");
            }
        }
    }

    if operator != Operator::Between && v2.is_some() {
        return Err(Error::InvalidArgument(format!(
            "operator {} takes at most one value",
            operator
        )));
    }

    Ok(())
}

fn compile_in(
    path: &str,
    existing_values: &HashSet<String>,
    existing_names: &HashMap<String, String>,
    value: Option<Value>,
) -> Result<Expression> {
    let candidates = match value {
        Some(Value::L(values)) if !values.is_empty() => values,
        Some(Value::L(_)) => {
            return Err(Error::InvalidArgument("IN requires at least one value".into()));
        }
        _ => return Err(Error::InvalidArgument("IN requires a list of values".into())),
    };

    let placeholders = path_placeholders(path, existing_names)?;

    let mut taken = existing_values.clone();
    let mut value_names = Vec::with_capacity(candidates.len());
    let mut attribute_values = HashMap::new();

    for candidate in candidates {
        let name = unique_value_name(path, &taken);
        taken.insert(name.clone());
        attribute_values.insert(name.clone(), candidate.normalized());
        value_names.push(name);
    }

    let statement = format!("{} IN ({})", placeholders.expression, value_names.join(", "));

    let mut attribute_names = HashMap::new();
    merge_names(&mut attribute_names, placeholders.names.into_iter().collect())?;

    trace!(statement = %statement, "compiled IN filter expression");
    Ok(Expression {
        statement,
        attribute_names,
        attribute_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn num(n: i64) -> Option<Value> {
        Some(Value::number(n))
    }

    #[test]
    fn test_comparison() {
        let expr = build_filter_expression("age", Operator::Gt, &[], num(21), None).unwrap();

        assert_eq!(expr.statement, "#age > :age");
        assert_eq!(expr.attribute_names.len(), 1);
        assert_eq!(expr.attribute_names["#age"], "age");
        assert_eq!(expr.attribute_values.len(), 1);
        assert_eq!(expr.attribute_values[":age"], Value::number(21));
    }

    #[test]
    fn test_all_comparison_operators() {
        for (op, text) in [
            (Operator::Eq, "="),
            (Operator::Ne, "<>"),
            (Operator::Lt, "<"),
            (Operator::Le, "<="),
            (Operator::Gt, ">"),
            (Operator::Ge, ">="),
        ] {
            let expr = build_filter_expression("n", op, &[], num(1), None).unwrap();
            assert_eq!(expr.statement, format!("#n {} :n", text));
        }
    }

    #[test]
    fn test_between() {
        let expr = build_filter_expression("age", Operator::Between, &[], num(18), num(65)).unwrap();

        assert_eq!(expr.statement, "#age BETWEEN :age AND :age_2");
        assert_eq!(expr.attribute_values[":age"], Value::number(18));
        assert_eq!(expr.attribute_values[":age_2"], Value::number(65));
    }

    #[test]
    fn test_in() {
        let values = Value::list(vec![Value::number(1), Value::number(2), Value::number(3)]);
        let expr = build_filter_expression("field", Operator::In, &[], Some(values), None).unwrap();

        assert_eq!(expr.statement, "#field IN (:field, :field_2, :field_3)");
        assert_eq!(expr.attribute_names["#field"], "field");
        assert_eq!(expr.attribute_values[":field"], Value::number(1));
        assert_eq!(expr.attribute_values[":field_2"], Value::number(2));
        assert_eq!(expr.attribute_values[":field_3"], Value::number(3));
    }

    #[test]
    fn test_in_avoids_existing_names() {
        let values = Value::list(vec![Value::string("a"), Value::string("b")]);
        let existing = vec![":status".to_string(), ":status_3".to_string()];
        let expr = build_filter_expression("status", Operator::In, &existing, Some(values), None).unwrap();

        assert_eq!(expr.statement, "#status IN (:status_2, :status_4)");
    }

    #[test]
    fn test_in_requires_list() {
        assert!(build_filter_expression("f", Operator::In, &[], num(1), None).is_err());
        assert!(build_filter_expression("f", Operator::In, &[], Some(Value::list(vec![])), None).is_err());
        assert!(build_filter_expression("f", Operator::In, &[], None, None).is_err());
    }

    #[test]
    fn test_function_operators() {
        let expr = build_filter_expression("name", Operator::BeginsWith, &[], Some(Value::string("Jo")), None).unwrap();
        assert_eq!(expr.statement, "begins_with(#name, :name)");

        let expr = build_filter_expression("tags", Operator::NotContains, &[], Some(Value::string("x")), None).unwrap();
        assert_eq!(expr.statement, "NOT contains(#tags, :tags)");

        let expr = build_filter_expression("email", Operator::AttributeNotExists, &[], None, None).unwrap();
        assert_eq!(expr.statement, "attribute_not_exists(#email)");
        assert!(expr.attribute_values.is_empty());
    }

    #[test]
    fn test_attribute_exists_boolean_operand() {
        let expr = build_filter_expression("email", Operator::AttributeExists, &[], Some(Value::Bool(true)), None).unwrap();
        assert_eq!(expr.statement, "attribute_exists(#email)");
        assert!(expr.attribute_values.is_empty());

        let expr = build_filter_expression("email", Operator::AttributeExists, &[], Some(Value::Bool(false)), None).unwrap();
        assert_eq!(expr.statement, "attribute_not_exists(#email)");
        assert!(expr.attribute_values.is_empty());
    }

    #[test]
    fn test_nested_path() {
        let expr = build_filter_expression("address.city", Operator::Eq, &[], Some(Value::string("Oslo")), None).unwrap();

        assert_eq!(expr.statement, "#address.#city = :address_city");
        assert_eq!(expr.attribute_names["#address"], "address");
        assert_eq!(expr.attribute_names["#city"], "city");
        assert_eq!(expr.attribute_values[":address_city"], Value::string("Oslo"));
    }

    #[test]
    fn test_existing_value_names_avoided() {
        let first = build_filter_expression("age", Operator::Ge, &[], num(18), None).unwrap();
        let second = build_filter_expression("age", Operator::Lt, &first.value_names(), num(65), None).unwrap();

        assert_eq!(second.statement, "#age < :age_2");
        assert!(first
            .attribute_values
            .keys()
            .all(|k| !second.attribute_values.contains_key(k)));
    }

    #[test]
    fn test_date_operand_normalized() {
        let d = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let expr = build_filter_expression("created", Operator::Lt, &[], Some(Value::date(d)), None).unwrap();
        assert_eq!(
            expr.attribute_values[":created"],
            Value::string("2024-02-29T12:00:00.000Z")
        );
    }

    #[test]
    fn test_missing_operands_fail() {
        assert!(build_filter_expression("a", Operator::Gt, &[], None, None).is_err());
        assert!(build_filter_expression("a", Operator::Between, &[], num(1), None).is_err());
        assert!(build_filter_expression("a", Operator::Eq, &[], num(1), num(2)).is_err());
        assert!(build_filter_expression("a", Operator::AttributeNotExists, &[], num(1), None).is_err());
    }

    #[test]
    fn test_operator_from_str() {
        assert_eq!(">".parse::<Operator>().unwrap(), Operator::Gt);
        assert_eq!("NOT contains".parse::<Operator>().unwrap(), Operator::NotContains);
        assert_eq!("BETWEEN".parse::<Operator>().unwrap(), Operator::Between);

        let err = "~=".parse::<Operator>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperator(ref op) if op == "~="));
    }
}
