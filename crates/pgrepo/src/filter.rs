//! Where-expression trees.
//!
//! Callers describe filters as JSON-shaped trees:
//!
//! ```ignore
//! use serde_json::json;
//!
//! let filter = json!({
//!     "name": { "contains": "bar" },
//!     "or": [{ "store": 12 }, { "sku": ["a", "b", null] }],
//!     "price": { "!": null },
//! });
//! ```
//!
//! Each object key is either a reserved [`Comparator`] token or a property name.
//! The tree is resolved once into [`WhereExpr`] before compilation so the
//! compiler works over a closed set of node shapes.

use crate::value::Value;
use std::fmt;

/// A where filter as supplied by callers.
pub type Where = serde_json::Value;

/// Reserved operator tokens recognized inside a where expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Or,
    And,
    Not,
    Like,
    Contains,
    StartsWith,
    EndsWith,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    /// Classify an object key. Any key that is not a reserved token is a property name.
    pub fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "or" => Comparator::Or,
            "and" => Comparator::And,
            "not" | "!" => Comparator::Not,
            "like" => Comparator::Like,
            "contains" => Comparator::Contains,
            "startsWith" => Comparator::StartsWith,
            "endsWith" => Comparator::EndsWith,
            "<" => Comparator::Lt,
            "<=" => Comparator::Lte,
            ">" => Comparator::Gt,
            ">=" => Comparator::Gte,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Or => "or",
            Comparator::And => "and",
            Comparator::Not => "not",
            Comparator::Like => "like",
            Comparator::Contains => "contains",
            Comparator::StartsWith => "startsWith",
            Comparator::EndsWith => "endsWith",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
        }
    }

    /// SQL operator for ordering comparators, flipped to its complement when negated.
    pub(crate) fn ordering_operator(self, negated: bool) -> Option<&'static str> {
        let op = match (self, negated) {
            (Comparator::Lt, false) | (Comparator::Gte, true) => "<",
            (Comparator::Lte, false) | (Comparator::Gt, true) => "<=",
            (Comparator::Gt, false) | (Comparator::Lte, true) => ">",
            (Comparator::Gte, false) | (Comparator::Lt, true) => ">=",
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object key after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereKey {
    Comparator(Comparator),
    Property(String),
}

impl WhereKey {
    pub fn parse(key: &str) -> Self {
        match Comparator::parse(key) {
            Some(c) => WhereKey::Comparator(c),
            None => WhereKey::Property(key.to_string()),
        }
    }
}

/// A resolved where-expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereExpr {
    Null,
    Scalar(Value),
    Array(Vec<WhereExpr>),
    /// An object: keys in insertion order, implicitly AND-ed.
    Node(Vec<(WhereKey, WhereExpr)>),
}

impl WhereExpr {
    /// Find the value of a property key in an object node.
    pub fn property(&self, name: &str) -> Option<&WhereExpr> {
        match self {
            WhereExpr::Node(entries) => entries.iter().find_map(|(k, v)| match k {
                WhereKey::Property(p) if p == name => Some(v),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Whether an object node carries at least one comparator key.
    pub fn has_comparator(&self) -> bool {
        match self {
            WhereExpr::Node(entries) => entries
                .iter()
                .any(|(k, _)| matches!(k, WhereKey::Comparator(_))),
            _ => false,
        }
    }

    /// Borrow the string payload of a text scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WhereExpr::Scalar(v) => v.as_str(),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for WhereExpr {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => WhereExpr::Null,
            serde_json::Value::Array(items) => {
                WhereExpr::Array(items.iter().map(WhereExpr::from).collect())
            }
            serde_json::Value::Object(map) => WhereExpr::Node(
                map.iter()
                    .map(|(k, v)| (WhereKey::parse(k), WhereExpr::from(v)))
                    .collect(),
            ),
            scalar => WhereExpr::Scalar(Value::from(scalar)),
        }
    }
}

impl From<serde_json::Value> for WhereExpr {
    fn from(value: serde_json::Value) -> Self {
        WhereExpr::from(&value)
    }
}
