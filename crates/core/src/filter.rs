//! Metadata filter tree for vector store queries
//!
//! Filters are AND/OR/NOT combinations of field conditions. Vector store
//! backends translate them into their native filter syntax; the in-memory
//! store evaluates them directly with [`Filter::matches`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::document::Chunk;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Field value is one of an array of values
    In,
    /// String contains substring, or array contains element
    Contains,
}

/// A single field condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Condition(FieldCondition),
}

impl Filter {
    pub fn condition(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Filter::Condition(FieldCondition {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, FilterOp::Equals, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, FilterOp::Contains, value)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Combine with another filter under AND, flattening nested ANDs
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            },
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate the filter against a chunk
    ///
    /// An empty AND matches everything; an empty OR matches nothing.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(chunk)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(chunk)),
            Filter::Not(inner) => !inner.matches(chunk),
            Filter::Condition(cond) => cond.matches(chunk.field(&cond.field).as_ref()),
        }
    }
}

impl FieldCondition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            // Absent fields only satisfy negative conditions
            return self.op == FilterOp::NotEquals;
        };

        match self.op {
            FilterOp::Equals => values_equal(actual, &self.value),
            FilterOp::NotEquals => !values_equal(actual, &self.value),
            FilterOp::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::GreaterThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOp::LessThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::In => match &self.value {
                Value::Array(options) => options.iter().any(|v| values_equal(actual, v)),
                _ => false,
            },
            FilterOp::Contains => match actual {
                Value::String(s) => self
                    .value
                    .as_str()
                    .map(|needle| s.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
                Value::Array(items) => items.iter().any(|v| values_equal(v, &self.value)),
                _ => false,
            },
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
