//! Scoped reads and guarded writes over a [`RecordStore`].

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{TenancyResult, ValidationError};
use crate::scope::{Predicate, ScopePredicateBuilder};
use crate::tenant::{Tenancy, TenantContext, TenantRef, same_key};
use crate::validation::{AssociationIntegrityChecker, MutationGuard, UniquenessPolicy};

use super::{Record, RecordStore};

/// The data-access surface of the tenancy layer.
///
/// Every default read of a registered type is filtered by the scope
/// predicate of the given context, including counts and existence checks.
/// Writes assign the current tenant to new rows, keep persisted tenant keys
/// immutable, and run the declared uniqueness and association validations
/// before anything is stored.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::scope::{RegisterOptions, TenantDimension};
/// use helios_tenancy::store::{MemoryStore, Record, Repository};
/// use helios_tenancy::tenant::TenantRef;
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// tenancy
///     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
///     .unwrap();
/// let repo = Repository::new(tenancy.clone(), MemoryStore::new());
/// let ctx = tenancy.context();
///
/// ctx.with_tenant(TenantRef::new("Account", 1), || {
///     repo.create(&ctx, Record::new("Project").with("name", "bar")).unwrap();
/// });
///
/// ctx.with_tenant(TenantRef::new("Account", 2), || {
///     assert_eq!(repo.count("Project", &ctx).unwrap(), 0);
/// });
/// assert_eq!(repo.count("Project", &ctx).unwrap(), 1);
/// ```
pub struct Repository<S: RecordStore> {
    tenancy: Arc<Tenancy>,
    store: S,
}

impl<S: RecordStore> Repository<S> {
    /// Wraps a store.
    pub fn new(tenancy: Arc<Tenancy>, store: S) -> Self {
        Self { tenancy, store }
    }

    /// Returns the tenancy.
    pub fn tenancy(&self) -> &Arc<Tenancy> {
        &self.tenancy
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the default-scope predicate of an entity type.
    pub fn scope(&self, entity_type: &str, ctx: &TenantContext) -> TenancyResult<Predicate> {
        ScopePredicateBuilder::new(&self.tenancy)
            .with_store(&self.store)
            .build_predicate(entity_type, ctx)
    }

    /// Returns every row visible under the context.
    pub fn all(&self, entity_type: &str, ctx: &TenantContext) -> TenancyResult<Vec<Record>> {
        self.where_(entity_type, ctx, Predicate::All)
    }

    /// Returns the visible rows that also match `filter`.
    pub fn where_(
        &self,
        entity_type: &str,
        ctx: &TenantContext,
        filter: Predicate,
    ) -> TenancyResult<Vec<Record>> {
        let predicate = self.scope(entity_type, ctx)?.and(filter);
        Ok(self.select(entity_type, &predicate))
    }

    /// Counts the visible rows.
    pub fn count(&self, entity_type: &str, ctx: &TenantContext) -> TenancyResult<usize> {
        let predicate = self.scope(entity_type, ctx)?;
        Ok(self
            .store
            .rows(entity_type)
            .iter()
            .filter(|row| predicate.matches(row, &self.store))
            .count())
    }

    /// Returns `true` if any visible row matches `filter`.
    pub fn exists(
        &self,
        entity_type: &str,
        ctx: &TenantContext,
        filter: Predicate,
    ) -> TenancyResult<bool> {
        let predicate = self.scope(entity_type, ctx)?.and(filter);
        Ok(self
            .store
            .rows(entity_type)
            .iter()
            .any(|row| predicate.matches(row, &self.store)))
    }

    /// Finds a visible row by primary key.
    pub fn find(
        &self,
        entity_type: &str,
        ctx: &TenantContext,
        key: impl Into<Value>,
    ) -> TenancyResult<Option<Record>> {
        let key = key.into();
        let primary_key = self.store.primary_key(entity_type);
        let predicate = self.scope(entity_type, ctx)?;
        Ok(self.store.rows(entity_type).into_iter().find(|row| {
            row.value(&primary_key).is_some_and(|v| same_key(v, &key))
                && predicate.matches(row, &self.store)
        }))
    }

    /// Returns every row of the type, bypassing tenant scoping.
    pub fn unscoped_all(&self, entity_type: &str) -> Vec<Record> {
        self.store.rows(entity_type)
    }

    /// Builds a new row with the current tenant already assigned.
    pub fn new_record(&self, entity_type: &str, ctx: &TenantContext) -> TenancyResult<Record> {
        let mut record = Record::new(entity_type);
        MutationGuard::new(ctx).on_create(&mut record)?;
        Ok(record)
    }

    /// Validates and inserts a new row.
    pub fn create(&self, ctx: &TenantContext, mut record: Record) -> TenancyResult<Record> {
        MutationGuard::new(ctx).on_create(&mut record)?;
        self.validate(ctx, &record)?;
        debug!(entity_type = record.entity_type(), "creating record");
        self.store.insert(record)
    }

    /// Validates and stores a row, inserting it if it was never persisted.
    pub fn save(&self, ctx: &TenantContext, record: Record) -> TenancyResult<Record> {
        if record.is_new_record() {
            return self.create(ctx, record);
        }
        MutationGuard::new(ctx).check_unchanged(&record)?;
        self.validate(ctx, &record)?;
        debug!(entity_type = record.entity_type(), "updating record");
        self.store.update(record)
    }

    /// Deletes a visible row by primary key, returning whether it existed.
    pub fn delete(
        &self,
        entity_type: &str,
        ctx: &TenantContext,
        key: impl Into<Value>,
    ) -> TenancyResult<bool> {
        let key = key.into();
        if self.find(entity_type, ctx, key.clone())?.is_none() {
            return Ok(false);
        }
        self.store.delete(entity_type, &key)
    }

    /// Runs the uniqueness and association validations of a row.
    pub fn validate(&self, ctx: &TenantContext, record: &Record) -> TenancyResult<()> {
        let mut details = UniquenessPolicy::new(&self.tenancy, &self.store).validate_declared(record)?;
        details.extend(AssociationIntegrityChecker::new(&self.tenancy, &self.store).check(record, ctx)?);

        if details.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::InvalidRecord {
                entity_type: record.entity_type().to_string(),
                details,
            }
            .into())
        }
    }

    /// Returns `true` if the row passes validation.
    ///
    /// Errors other than validation failures are propagated.
    pub fn is_valid(&self, ctx: &TenantContext, record: &Record) -> TenancyResult<bool> {
        match self.validate(ctx, record) {
            Ok(()) => Ok(true),
            Err(err) if err.is_invalid_record() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Writes a tenant foreign key through the mutation guard.
    pub fn set_tenant_key(
        &self,
        ctx: &TenantContext,
        record: &mut Record,
        dimension: &str,
        value: impl Into<Value>,
    ) -> TenancyResult<()> {
        MutationGuard::new(ctx).set_tenant_key(record, dimension, value)
    }

    /// Points a tenant dimension at a tenant through the mutation guard.
    pub fn set_tenant(
        &self,
        ctx: &TenantContext,
        record: &mut Record,
        dimension: &str,
        tenant: Option<&TenantRef>,
    ) -> TenancyResult<()> {
        MutationGuard::new(ctx).set_tenant(record, dimension, tenant)
    }

    fn select(&self, entity_type: &str, predicate: &Predicate) -> Vec<Record> {
        self.store
            .rows(entity_type)
            .into_iter()
            .filter(|row| predicate.matches(row, &self.store))
            .collect()
    }
}
