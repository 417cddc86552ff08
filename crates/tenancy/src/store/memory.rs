//! In-memory record store.
//!
//! [`MemoryStore`] is a complete [`RecordStore`] kept in process memory. It is
//! the reference data-access layer used by the repository tests and is handy
//! for embedding the tenancy layer in tools that have no database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{StoreError, TenancyResult};
use crate::job::TenantLocator;
use crate::request::TenantFinder;
use crate::scope::Predicate;
use crate::tenant::{Tenancy, TenantRef, key_to_string, same_key};

use super::{Record, RecordStore};

/// A [`RecordStore`] that keeps rows in memory.
///
/// The store owns the primary key of every type. A store built with
/// [`for_tenancy`](Self::for_tenancy) takes them from the tenancy's
/// configuration and registrations.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    sequences: RwLock<HashMap<String, i64>>,
    default_primary_key: DefaultKey,
    primary_keys: HashMap<String, String>,
}

#[derive(Debug)]
enum DefaultKey {
    Fixed(String),
    Tenancy(Arc<Tenancy>),
}

impl MemoryStore {
    /// Creates an empty store using `id` as every type's primary key.
    pub fn new() -> Self {
        Self::with_default_primary_key("id")
    }

    /// Creates an empty store with a different default primary key.
    pub fn with_default_primary_key(primary_key: impl Into<String>) -> Self {
        Self::with_keys(DefaultKey::Fixed(primary_key.into()))
    }

    /// Creates an empty store keyed the way `tenancy` is configured.
    ///
    /// Types use their registered primary key, and everything else
    /// [`TenancyConfig::primary_key_name`](crate::TenancyConfig::primary_key_name).
    pub fn for_tenancy(tenancy: &Arc<Tenancy>) -> Self {
        Self::with_keys(DefaultKey::Tenancy(Arc::clone(tenancy)))
    }

    fn with_keys(default_primary_key: DefaultKey) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            sequences: RwLock::new(HashMap::new()),
            default_primary_key,
            primary_keys: HashMap::new(),
        }
    }

    /// Overrides the primary key of one entity type.
    pub fn with_primary_key(
        mut self,
        entity_type: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        self.primary_keys
            .insert(entity_type.into(), primary_key.into());
        self
    }

    /// Returns the number of rows of a type, ignoring any scoping.
    pub fn len(&self, entity_type: &str) -> usize {
        self.tables.read().get(entity_type).map_or(0, Vec::len)
    }

    /// Returns `true` if the store holds no rows of the type.
    pub fn is_empty(&self, entity_type: &str) -> bool {
        self.len(entity_type) == 0
    }

    fn next_key(&self, entity_type: &str) -> i64 {
        let mut sequences = self.sequences.write();
        let next = sequences.entry(entity_type.to_string()).or_insert(0);
        *next += 1;
        *next
    }

    fn bump_sequence(&self, entity_type: &str, key: &Value) {
        if let Some(key) = key.as_i64() {
            let mut sequences = self.sequences.write();
            let current = sequences.entry(entity_type.to_string()).or_insert(0);
            *current = (*current).max(key);
        }
    }

    fn find_unscoped(
        &self,
        entity_type: &str,
        column: &str,
        value: &Value,
        scope: Option<&Predicate>,
    ) -> Option<Record> {
        self.rows(entity_type).into_iter().find(|row| {
            row.value(column).is_some_and(|v| same_key(v, value))
                && scope.is_none_or(|p| p.matches(row, self))
        })
    }

    fn tenant_from_row(&self, row: Record) -> TenantRef {
        let key = row
            .get(&self.primary_key(row.entity_type()))
            .cloned()
            .unwrap_or(Value::Null);
        TenantRef::new(row.entity_type(), key).with_attributes(row.fields().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn primary_key(&self, entity_type: &str) -> String {
        if let Some(primary_key) = self.primary_keys.get(entity_type) {
            return primary_key.clone();
        }
        match &self.default_primary_key {
            DefaultKey::Fixed(primary_key) => primary_key.clone(),
            DefaultKey::Tenancy(tenancy) => tenancy.primary_key_of(entity_type),
        }
    }

    fn rows(&self, entity_type: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    fn insert(&self, mut record: Record) -> TenancyResult<Record> {
        if record.is_persisted() {
            return Err(StoreError::AlreadyPersisted {
                entity_type: record.entity_type().to_string(),
            }
            .into());
        }

        let primary_key = self.primary_key(record.entity_type());
        let mut tables = self.tables.write();
        let rows = tables.entry(record.entity_type().to_string()).or_default();

        match record.value(&primary_key).cloned() {
            Some(key) => {
                if rows
                    .iter()
                    .any(|row| row.value(&primary_key).is_some_and(|v| same_key(v, &key)))
                {
                    return Err(StoreError::DuplicateKey {
                        entity_type: record.entity_type().to_string(),
                        key: key_to_string(&key),
                    }
                    .into());
                }
                self.bump_sequence(record.entity_type(), &key);
            }
            None => {
                let key = self.next_key(record.entity_type());
                record.set(primary_key, key);
            }
        }

        record.mark_persisted();
        rows.push(record.clone());
        Ok(record)
    }

    fn update(&self, mut record: Record) -> TenancyResult<Record> {
        let primary_key = self.primary_key(record.entity_type());
        // Rows are matched on their persisted key, so a changed key still finds its row.
        let key = record
            .persisted_value(&primary_key)
            .cloned()
            .ok_or_else(|| StoreError::NotPersisted {
                entity_type: record.entity_type().to_string(),
            })?;

        let mut tables = self.tables.write();
        let slot = tables
            .get_mut(record.entity_type())
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.value(&primary_key).is_some_and(|v| same_key(v, &key)))
            })
            .ok_or_else(|| StoreError::NotFound {
                entity_type: record.entity_type().to_string(),
                key: key.to_string(),
            })?;

        record.mark_persisted();
        *slot = record.clone();
        Ok(record)
    }

    fn delete(&self, entity_type: &str, key: &Value) -> TenancyResult<bool> {
        let primary_key = self.primary_key(entity_type);
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(entity_type) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !row.value(&primary_key).is_some_and(|v| same_key(v, key)));
        Ok(rows.len() != before)
    }
}

#[async_trait]
impl TenantLocator for MemoryStore {
    async fn locate(
        &self,
        tenant_type: &str,
        key: &Value,
        scope: Option<&Predicate>,
    ) -> TenancyResult<Option<TenantRef>> {
        let primary_key = self.primary_key(tenant_type);
        Ok(self
            .find_unscoped(tenant_type, &primary_key, key, scope)
            .map(|row| self.tenant_from_row(row)))
    }
}

impl TenantFinder for MemoryStore {
    fn find_by(&self, tenant_type: &str, column: &str, value: &str) -> Option<TenantRef> {
        self.find_unscoped(tenant_type, column, &Value::from(value), None)
            .map(|row| self.tenant_from_row(row))
    }
}
