//! Access to the tenant keys of a row.

use serde_json::Value;

use crate::scope::TenantDimension;
use crate::store::Record;

use super::id::TenantRef;

/// A row whose tenant keys can be read and written by the guards.
///
/// Implementors only provide raw field access. The tenant-specific accessors
/// are derived from a [`TenantDimension`], so every entity type shares the
/// same rules for reading and assigning its tenant.
pub trait TenantBound {
    /// Returns the entity type name.
    fn entity_type(&self) -> &str;

    /// Returns the current value of a field, `None` when unset or null.
    fn read_field(&self, field: &str) -> Option<&Value>;

    /// Returns the last persisted value of a field, `None` when unset or null.
    fn persisted_field(&self, field: &str) -> Option<&Value>;

    /// Writes a field.
    fn write_field(&mut self, field: &str, value: Value);

    /// Returns `true` if the row has been persisted.
    fn is_persisted(&self) -> bool;

    /// Returns the tenant key stored for a dimension.
    fn tenant_key(&self, dimension: &TenantDimension) -> Option<&Value> {
        self.read_field(dimension.foreign_key_column())
    }

    /// Returns the tenant a dimension currently points at.
    ///
    /// For polymorphic dimensions the type comes from the type column. When
    /// the dimension references a tenant column other than the primary key,
    /// the stored value is carried as that attribute of an unsaved reference.
    fn tenant_association(&self, dimension: &TenantDimension) -> Option<TenantRef> {
        let key = self.tenant_key(dimension)?.clone();
        let tenant_type = match dimension.type_column() {
            Some(column) => self.read_field(column)?.as_str()?.to_string(),
            None => dimension.tenant_type()?.to_string(),
        };
        Some(match dimension.referenced_key() {
            Some(column) => TenantRef::unsaved(tenant_type).with_attribute(column, key),
            None => TenantRef::new(tenant_type, key),
        })
    }
}

impl TenantBound for Record {
    fn entity_type(&self) -> &str {
        Record::entity_type(self)
    }

    fn read_field(&self, field: &str) -> Option<&Value> {
        self.value(field)
    }

    fn persisted_field(&self, field: &str) -> Option<&Value> {
        self.persisted_value(field)
    }

    fn write_field(&mut self, field: &str, value: Value) {
        self.set(field, value);
    }

    fn is_persisted(&self) -> bool {
        Record::is_persisted(self)
    }
}
