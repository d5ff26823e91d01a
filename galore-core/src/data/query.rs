//! Filtering and ordering of records
//!
//! Filter keys follow the REST dialect the admin screens speak:
//! - `field: value` equality (arrays mean "any of"; array-valued fields match on membership)
//! - `q: text` case-insensitive search over string and number fields
//! - `field_gte`, `field_lte`, `field_gt`, `field_lt`, `field_neq` comparisons
//!
//! Values of different JSON types compare by their textual form, so a
//! filter of `"3"` matches a field holding `3`.

use crate::core::{Filter, Record, Sort, SortOrder};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Neq,
    Gte,
    Lte,
    Gt,
    Lt,
}

const OPERATOR_SUFFIXES: [(&str, Operator); 5] = [
    ("_gte", Operator::Gte),
    ("_lte", Operator::Lte),
    ("_neq", Operator::Neq),
    ("_gt", Operator::Gt),
    ("_lt", Operator::Lt),
];

fn split_operator(key: &str) -> (&str, Operator) {
    for (suffix, op) in OPERATOR_SUFFIXES {
        if let Some(field) = key.strip_suffix(suffix) {
            if !field.is_empty() {
                return (field, op);
            }
        }
    }
    (key, Operator::Eq)
}

/// Whether `record` satisfies every condition of `filter`
pub fn matches_filter(record: &Record, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| matches_condition(record, key, expected))
}

fn matches_condition(record: &Record, key: &str, expected: &Value) -> bool {
    if key == "q" {
        return matches_text(record, expected);
    }

    // A field literally named like `foo_gte` wins over the operator reading
    let (field, op) = if record.get(key).is_some() {
        (key, Operator::Eq)
    } else {
        split_operator(key)
    };
    let actual = record.get(field).unwrap_or(&Value::Null);

    match op {
        Operator::Eq => matches_any(actual, expected),
        Operator::Neq => !matches_any(actual, expected),
        Operator::Gte => !actual.is_null() && compare_values(actual, expected) != Ordering::Less,
        Operator::Lte => !actual.is_null() && compare_values(actual, expected) != Ordering::Greater,
        Operator::Gt => !actual.is_null() && compare_values(actual, expected) == Ordering::Greater,
        Operator::Lt => !actual.is_null() && compare_values(actual, expected) == Ordering::Less,
    }
}

fn matches_any(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(options) => options.iter().any(|option| loose_eq(actual, option)),
        _ => loose_eq(actual, expected),
    }
}

fn matches_text(record: &Record, query: &Value) -> bool {
    let Some(needle) = value_text(query) else {
        return true;
    };
    let needle = needle.to_lowercase();
    record.fields().values().any(|value| {
        value_text(value).is_some_and(|text| text.to_lowercase().contains(&needle))
    })
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(items), _) => items.iter().any(|item| loose_eq(item, expected)),
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => match (value_text(actual), value_text(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Total order over JSON scalars: null first, numbers numerically, the rest textually
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => value_text(a).cmp(&value_text(b)),
    }
}

/// Stable in-place sort on one field
pub fn sort_records(records: &mut [Record], sort: &Sort) {
    let field = sort.field.as_str();
    records.sort_by(|a, b| {
        let ordering = compare_values(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        );
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
