//! Dynamic row representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tenant::same_key;

/// A row of some entity type.
///
/// A record tracks the field values as they were last persisted, so callers
/// can ask whether a field changed since the last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entity_type: String,
    fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    persisted: Option<Map<String, Value>>,
}

impl Record {
    /// Creates a new, unsaved record.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Map::new(),
            persisted: None,
        }
    }

    /// Sets a field, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the current value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the current value of a field, treating `null` as absent.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.get(field).filter(|v| !v.is_null())
    }

    /// Writes a field without any tenant checks.
    ///
    /// Tenant foreign keys written this way are still checked when the record
    /// is saved through a [`Repository`](super::Repository).
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns all current field values.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns `true` if the record has never been persisted.
    pub fn is_new_record(&self) -> bool {
        self.persisted.is_none()
    }

    /// Returns `true` if the record has been persisted.
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_some()
    }

    /// Returns the value a field had when last persisted.
    pub fn persisted_value(&self, field: &str) -> Option<&Value> {
        self.persisted
            .as_ref()
            .and_then(|p| p.get(field))
            .filter(|v| !v.is_null())
    }

    /// Returns `true` if the field differs from its last persisted value.
    ///
    /// Values are compared loosely, so writing `"5"` over a persisted `5`
    /// is not a change.
    pub fn changed(&self, field: &str) -> bool {
        let current = self.value(field);
        let previous = match &self.persisted {
            Some(_) => self.persisted_value(field),
            None => None,
        };
        match (current, previous) {
            (Some(a), Some(b)) => !same_key(a, b),
            (None, None) => false,
            _ => true,
        }
    }

    /// Records the current field values as the persisted state.
    pub fn mark_persisted(&mut self) {
        self.persisted = Some(self.fields.clone());
    }
}
