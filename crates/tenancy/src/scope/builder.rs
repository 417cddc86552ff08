//! Default-scope predicate construction.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TenancyResult, TenantError};
use crate::store::RecordStore;
use crate::tenant::{Tenancy, TenantContext, TenantRef};

use super::Predicate;
use super::spec::{EntityScopeSpec, TenantDimension};

/// Builds the row filter injected into every default read of an entity type.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::scope::{Predicate, RegisterOptions, ScopePredicateBuilder, TenantDimension};
/// use helios_tenancy::tenant::TenantRef;
/// use serde_json::json;
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// tenancy
///     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
///     .unwrap();
/// let ctx = tenancy.context();
/// let builder = ScopePredicateBuilder::new(&tenancy);
///
/// ctx.with_tenant(TenantRef::new("Account", 1), || {
///     let predicate = builder.build_predicate("Project", &ctx).unwrap();
///     assert_eq!(predicate, Predicate::is_in("account_id", vec![json!(1)]));
/// });
///
/// assert!(builder.build_predicate("Project", &ctx).unwrap().is_unrestricted());
/// ```
#[derive(Clone, Copy)]
pub struct ScopePredicateBuilder<'a> {
    tenancy: &'a Tenancy,
    store: Option<&'a dyn RecordStore>,
}

impl<'a> ScopePredicateBuilder<'a> {
    /// Creates a builder over a tenancy's registry.
    pub fn new(tenancy: &'a Tenancy) -> Self {
        Self {
            tenancy,
            store: None,
        }
    }

    /// Takes row primary keys from `store` instead of the tenancy configuration.
    pub fn with_store(mut self, store: &'a dyn RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    fn primary_key(&self, entity_type: &str) -> String {
        match self.store {
            Some(store) => store.primary_key(entity_type),
            None => self.tenancy.primary_key_of(entity_type),
        }
    }

    /// Builds the default-scope predicate of an entity type under a context.
    ///
    /// Unregistered types are never restricted. With no current tenant the
    /// predicate is unrestricted, unless a tenant is required and the context
    /// is not unscoped, which fails with [`TenantError::NoTenantSet`].
    pub fn build_predicate(&self, entity_type: &str, ctx: &TenantContext) -> TenancyResult<Predicate> {
        let Some(spec) = self.tenancy.spec(entity_type) else {
            return Ok(Predicate::All);
        };

        let Some(tenant) = ctx.current() else {
            if !ctx.is_unscoped() && self.tenancy.requires_tenant(&spec) {
                return Err(TenantError::NoTenantSet {
                    entity_type: entity_type.to_string(),
                }
                .into());
            }
            return Ok(Predicate::All);
        };

        let predicate = match matching_dimension(&spec, &tenant, spec.dimensions().iter())? {
            Some(dimension) => self.dimension_predicate(&spec, dimension, &tenant),
            None => {
                warn!(
                    entity_type,
                    tenant_type = tenant.type_name(),
                    "tenant type matches no dimension, scoping to global records only"
                );
                global_only(&spec)
            }
        };

        let predicate = match spec.unscoped_escape() {
            Some(escape) => predicate.or(escape.clone()),
            None => predicate,
        };

        debug!(entity_type, tenant = %tenant, "built tenant scope");
        Ok(predicate)
    }

    fn dimension_predicate(
        &self,
        spec: &EntityScopeSpec,
        dimension: &TenantDimension,
        tenant: &TenantRef,
    ) -> Predicate {
        let key = tenant.key_for(dimension.referenced_key());

        if let Some(through) = dimension.through_relation() {
            let Some(key) = key else {
                return Predicate::Nothing;
            };
            return Predicate::InSubquery {
                field: self.primary_key(spec.entity_type()),
                entity_type: through.entity_type.clone(),
                select: through.foreign_key.clone(),
                filter: Box::new(Predicate::eq(through.tenant_foreign_key.clone(), key)),
            };
        }

        let column = dimension.foreign_key_column();
        let owned = match (key, dimension.type_column()) {
            (None, _) => Predicate::Nothing,
            (Some(key), None) if spec.allows_global_records() => {
                return Predicate::is_in(column, vec![key, Value::Null]);
            }
            (Some(key), None) => Predicate::is_in(column, vec![key]),
            (Some(key), Some(type_column)) => Predicate::is_in(column, vec![key])
                .and(Predicate::eq(type_column, tenant.type_name())),
        };

        if spec.allows_global_records() {
            owned.or(Predicate::is_null(column))
        } else {
            owned
        }
    }
}

impl fmt::Debug for ScopePredicateBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopePredicateBuilder")
            .field("tenancy", &self.tenancy)
            .field("store", &self.store.is_some())
            .finish()
    }
}

fn global_only(spec: &EntityScopeSpec) -> Predicate {
    if !spec.allows_global_records() {
        return Predicate::Nothing;
    }
    spec.direct_dimensions()
        .map(|d| Predicate::is_null(d.foreign_key_column()))
        .fold(Predicate::All, Predicate::and)
}

/// Selects the one dimension that accepts the tenant's type.
///
/// Fails with [`TenantError::MultiplePolymorphicTenants`] when more than one does.
pub(crate) fn matching_dimension<'s>(
    spec: &EntityScopeSpec,
    tenant: &TenantRef,
    dimensions: impl Iterator<Item = &'s TenantDimension>,
) -> TenancyResult<Option<&'s TenantDimension>> {
    let mut matching = dimensions.filter(|d| d.accepts(tenant.type_name()));
    let first = matching.next();
    if first.is_some() && matching.next().is_some() {
        return Err(TenantError::MultiplePolymorphicTenants {
            entity_type: spec.entity_type().to_string(),
            tenant_type: tenant.type_name().to_string(),
        }
        .into());
    }
    Ok(first)
}
