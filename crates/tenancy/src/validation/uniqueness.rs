//! Tenant-aware uniqueness.

use std::iter;

use serde_json::Value;

use crate::error::{TenancyResult, TenantError, ValidationDetail};
use crate::scope::{EntityScopeSpec, Predicate};
use crate::store::{Record, RecordStore};
use crate::tenant::{Tenancy, same_key};

const TAKEN: &str = "has already been taken";

/// Options of a uniqueness declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniqueOptions {
    /// Additional fields that must match for two rows to collide.
    pub scope: Vec<String>,
    /// Only rows matching this filter take part in the check.
    pub conditions: Option<Predicate>,
    /// Message reported instead of "has already been taken".
    pub message: Option<String>,
}

impl UniqueOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scope field.
    pub fn scope(mut self, field: impl Into<String>) -> Self {
        self.scope.push(field.into());
        self
    }

    /// Restricts the rows that are checked.
    pub fn conditions(mut self, conditions: Predicate) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Overrides the failure message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A field declared unique within a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueConstraint {
    field: String,
    options: UniqueOptions,
}

impl UniqueConstraint {
    /// Creates a constraint on one field.
    pub fn new(field: impl Into<String>, options: UniqueOptions) -> Self {
        Self {
            field: field.into(),
            options,
        }
    }

    /// Returns the constrained field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the constraint options.
    pub fn options(&self) -> &UniqueOptions {
        &self.options
    }
}

/// Checks uniqueness within a tenant, and against global records.
///
/// The base check only compares rows sharing the candidate's tenant keys.
/// For types allowing global records a second check runs: a global candidate
/// collides with every row, a tenant-bound candidate with every global row.
/// Neither check matches the candidate's own persisted row.
pub struct UniquenessPolicy<'a> {
    tenancy: &'a Tenancy,
    store: &'a dyn RecordStore,
}

impl<'a> UniquenessPolicy<'a> {
    /// Creates a policy reading rows from `store`.
    pub fn new(tenancy: &'a Tenancy, store: &'a dyn RecordStore) -> Self {
        Self { tenancy, store }
    }

    /// Runs every constraint declared for the record's type.
    pub fn validate_declared(&self, record: &Record) -> TenancyResult<Vec<ValidationDetail>> {
        let mut details = Vec::new();
        for constraint in self.tenancy.unique_constraints(record.entity_type()) {
            if let Some(detail) =
                self.validate_unique(record, constraint.field(), constraint.options())?
            {
                details.push(detail);
            }
        }
        Ok(details)
    }

    /// Checks one field of a record, returning the failure if it is taken.
    ///
    /// Fails with [`TenantError::ModelNotScopedByTenant`] for unregistered types.
    pub fn validate_unique(
        &self,
        record: &Record,
        field: &str,
        options: &UniqueOptions,
    ) -> TenancyResult<Option<ValidationDetail>> {
        let entity_type = record.entity_type();
        let spec = self
            .tenancy
            .spec(entity_type)
            .ok_or_else(|| TenantError::ModelNotScopedByTenant {
                entity_type: entity_type.to_string(),
            })?;

        let value_fields: Vec<&str> = iter::once(field)
            .chain(options.scope.iter().map(String::as_str))
            .collect();
        let same_values = matching(record, value_fields.iter().copied());

        let mut checks = vec![same_values.clone().and(matching(record, tenant_columns(&spec)))];
        if spec.allows_global_records() {
            let mut keys = spec.direct_dimensions().map(|d| d.foreign_key_column());
            let is_global = keys.all(|column| record.value(column).is_none());
            let second = if is_global {
                same_values
            } else {
                spec.direct_dimensions()
                    .map(|d| Predicate::is_null(d.foreign_key_column()))
                    .fold(same_values, Predicate::and)
            };
            checks.push(second);
        }

        let conditions = options.conditions.clone().unwrap_or(Predicate::All);
        let primary_key = self.store.primary_key(entity_type);
        let own_key = record.persisted_value(&primary_key);

        let rows = self.store.rows(entity_type);
        let taken = checks.iter().any(|check| {
            rows.iter().any(|row| {
                let is_self = own_key
                    .zip(row.value(&primary_key))
                    .is_some_and(|(own, other)| same_key(own, other));
                !is_self && check.matches(row, self.store) && conditions.matches(row, self.store)
            })
        });

        Ok(taken.then(|| {
            ValidationDetail::error(field, options.message.as_deref().unwrap_or(TAKEN))
        }))
    }
}

fn tenant_columns(spec: &EntityScopeSpec) -> impl Iterator<Item = &str> {
    spec.direct_dimensions()
        .flat_map(|d| iter::once(d.foreign_key_column()).chain(d.type_column()))
}

/// Builds a predicate matching rows whose `fields` equal the record's.
fn matching<'f>(record: &Record, fields: impl Iterator<Item = &'f str>) -> Predicate {
    fields
        .map(|field| Predicate::eq(field, record.get(field).cloned().unwrap_or(Value::Null)))
        .fold(Predicate::All, Predicate::and)
}
