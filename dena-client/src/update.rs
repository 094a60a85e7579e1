/// Update objects for partial item mutation
///
/// An [`Update`] is sent verbatim as the body of a PATCH request. Each
/// operation group is omitted from the payload when empty.
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashSet};

/// Partial mutation of one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Fields to overwrite
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,

    /// Numeric deltas added to existing fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub increment: BTreeMap<String, Number>,

    /// Values added to the end of list fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub append: Map<String, Value>,

    /// Values added to the start of list fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub prepend: Map<String, Value>,

    /// Fields to remove
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,

    /// Fields given a NaN or infinite delta; reported by `validate`
    #[serde(skip)]
    non_finite: Vec<String>,
}

impl Update {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Add `delta` to a numeric field
    pub fn increment(mut self, field: impl Into<String>, delta: impl Into<Number>) -> Self {
        self.increment.insert(field.into(), delta.into());
        self
    }

    /// Add a fractional `delta` to a numeric field.
    ///
    /// JSON has no NaN or infinity; such a delta makes [`Update::validate`]
    /// fail instead of being sent.
    pub fn increment_f64(mut self, field: impl Into<String>, delta: f64) -> Self {
        let field = field.into();
        match Number::from_f64(delta) {
            Some(delta) => {
                self.increment.insert(field, delta);
            }
            None => {
                self.increment.remove(&field);
                self.non_finite.push(field);
            }
        }
        self
    }

    /// Append to a list field. An array value appends each of its elements.
    pub fn append(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.append.insert(field.into(), value.into());
        self
    }

    /// Prepend to a list field. An array value prepends each of its elements.
    pub fn prepend(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.prepend.insert(field.into(), value.into());
        self
    }

    /// Remove a field
    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.delete.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.increment.is_empty()
            && self.append.is_empty()
            && self.prepend.is_empty()
            && self.delete.is_empty()
            && self.non_finite.is_empty()
    }

    /// Reject a non-finite increment, or a `delete` list that names the same
    /// field twice.
    ///
    /// Runs before any request is sent.
    pub fn validate(&self) -> Result<()> {
        if let Some(field) = self.non_finite.first() {
            return Err(ClientError::InvalidArgument(format!(
                "increment for {} is not a finite number",
                field
            )));
        }

        let mut seen = HashSet::with_capacity(self.delete.len());
        for field in &self.delete {
            if !seen.insert(field.as_str()) {
                return Err(ClientError::InvalidArgument(format!(
                    "duplicate field in delete: {}",
                    field
                )));
            }
        }
        Ok(())
    }
}
