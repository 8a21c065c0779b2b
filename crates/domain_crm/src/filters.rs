//! Search filters encoded as `field[OPERATOR]=value` query parameters

use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::QueryParams;

/// Comparison operators understood by the CRM list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    Ne,
    Like,
    NotLike,
    In,
    Gt,
    Ge,
    Lt,
    Le,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "EQ",
            FilterOperator::Ne => "NE",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT_LIKE",
            FilterOperator::In => "IN",
            FilterOperator::Gt => "GT",
            FilterOperator::Ge => "GE",
            FilterOperator::Lt => "LT",
            FilterOperator::Le => "LE",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `field[operator]=value` condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Dotted field path, e.g. `contactInfo.email`
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

/// Conjunction of filter conditions, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    conditions: Vec<Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition
    pub fn with(mut self, field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        self.conditions.push(Filter {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, FilterOperator::Eq, value)
    }

    /// Case-insensitive "contains" match
    pub fn contains(self, field: impl Into<String>, value: &str) -> Self {
        self.with(field, FilterOperator::Like, format!("%{}%", value))
    }

    /// Membership in a comma-separated set
    pub fn any_of<I, S>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.with(field, FilterOperator::In, joined)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Filter] {
        &self.conditions
    }

    /// Encodes the conditions as query parameters
    pub fn to_params(&self) -> QueryParams {
        self.conditions
            .iter()
            .map(|c| (format!("{}[{}]", c.field, c.operator), c.value.clone()))
            .collect()
    }
}
