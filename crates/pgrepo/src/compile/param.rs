//! Parameter accumulator shared by every fragment of one statement.

use crate::value::Value;

/// Ordered bind values. The 1-based position of a value is its `$n` index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    params: Vec<Value>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its 1-based index.
    pub fn push(&mut self, value: impl Into<Value>) -> usize {
        self.params.push(value.into());
        self.params.len()
    }

    /// Add a parameter and return its `$n` placeholder.
    pub fn placeholder(&mut self, value: impl Into<Value>) -> String {
        format!("${}", self.push(value))
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.params
    }
}
