//! Tenant assignment and immutability.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConfigError, TenancyResult, TenantError};
use crate::scope::{EntityScopeSpec, TenantDimension, matching_dimension};
use crate::tenant::{TenantBound, TenantContext, TenantRef, same_key};

/// Guards the tenant keys of rows.
///
/// On creation the guard fills unset tenant keys from the current tenant.
/// Afterward, a persisted tenant key may only be written with a value equal
/// to the persisted one, unless the context is in mutable-tenant mode. The
/// same rule applies whether the key is written as a scalar
/// ([`set_tenant_key`](Self::set_tenant_key)) or through the tenant
/// reference ([`set_tenant`](Self::set_tenant)).
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::scope::{RegisterOptions, TenantDimension};
/// use helios_tenancy::store::Record;
/// use helios_tenancy::tenant::TenantRef;
/// use helios_tenancy::validation::MutationGuard;
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// tenancy
///     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
///     .unwrap();
/// let ctx = tenancy.context();
/// let guard = MutationGuard::new(&ctx);
///
/// let mut project = Record::new("Project").with("account_id", 5);
/// project.mark_persisted();
///
/// assert!(guard.set_tenant_key(&mut project, "account", "5").is_ok());
/// assert!(guard.set_tenant_key(&mut project, "account", 6).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MutationGuard<'a> {
    ctx: &'a TenantContext,
}

impl<'a> MutationGuard<'a> {
    /// Creates a guard for a context.
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    /// Fills the tenant key of a new row from the current tenant.
    ///
    /// Keys that are already set are left alone. For polymorphic dimensions
    /// the type column is filled as well. Fails with
    /// [`TenantError::NoTenantSet`] when there is no tenant, one is required
    /// and the context is not unscoped.
    pub fn on_create<E: TenantBound + ?Sized>(&self, entity: &mut E) -> TenancyResult<()> {
        let Some(spec) = self.ctx.tenancy().spec(entity.entity_type()) else {
            return Ok(());
        };
        let Some(tenant) = self.ctx.current() else {
            return self.ensure_tenant_optional(&spec);
        };
        let Some(dimension) = matching_dimension(&spec, &tenant, spec.direct_dimensions())? else {
            return Ok(());
        };
        if entity.tenant_key(dimension).is_some() {
            return Ok(());
        }
        let Some(key) = tenant.key_for(dimension.referenced_key()) else {
            return Ok(());
        };

        debug!(
            entity_type = entity.entity_type(),
            tenant = %tenant,
            "assigning current tenant to new row"
        );
        entity.write_field(dimension.foreign_key_column(), key);
        if let Some(type_column) = dimension.type_column() {
            entity.write_field(type_column, Value::from(tenant.type_name()));
        }
        Ok(())
    }

    /// Writes the tenant key of a dimension.
    pub fn set_tenant_key<E: TenantBound + ?Sized>(
        &self,
        entity: &mut E,
        dimension: &str,
        value: impl Into<Value>,
    ) -> TenancyResult<()> {
        let dimension = self.dimension(entity.entity_type(), dimension)?;
        let value = value.into();
        self.check_write(entity, dimension.foreign_key_column(), &value)?;
        entity.write_field(dimension.foreign_key_column(), value);
        Ok(())
    }

    /// Points a dimension at a tenant, or at no tenant.
    pub fn set_tenant<E: TenantBound + ?Sized>(
        &self,
        entity: &mut E,
        dimension: &str,
        tenant: Option<&TenantRef>,
    ) -> TenancyResult<()> {
        let dimension = self.dimension(entity.entity_type(), dimension)?;

        if let Some(tenant) = tenant
            && !dimension.accepts(tenant.type_name())
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "{}.{} cannot reference tenant type {}",
                    entity.entity_type(),
                    dimension.name(),
                    tenant.type_name()
                ),
            }
            .into());
        }

        let key = tenant
            .and_then(|t| t.key_for(dimension.referenced_key()))
            .unwrap_or(Value::Null);
        self.check_write(entity, dimension.foreign_key_column(), &key)?;

        let tenant_type = tenant.map_or(Value::Null, |t| Value::from(t.type_name()));
        if let Some(type_column) = dimension.type_column() {
            self.check_write(entity, type_column, &tenant_type)?;
        }

        entity.write_field(dimension.foreign_key_column(), key);
        if let Some(type_column) = dimension.type_column() {
            entity.write_field(type_column, tenant_type);
        }
        Ok(())
    }

    /// Verifies that no persisted tenant key was changed behind the guard's back.
    ///
    /// Run before a persisted row is written, so that raw field writes obey
    /// the same rule as guarded ones. Like [`on_create`](Self::on_create), it
    /// fails with [`TenantError::NoTenantSet`] when a required tenant is missing.
    pub fn check_unchanged<E: TenantBound + ?Sized>(&self, entity: &E) -> TenancyResult<()> {
        let Some(spec) = self.ctx.tenancy().spec(entity.entity_type()) else {
            return Ok(());
        };
        if self.ctx.current().is_none() {
            self.ensure_tenant_optional(&spec)?;
        }
        for dimension in spec.direct_dimensions() {
            let columns = std::iter::once(dimension.foreign_key_column()).chain(dimension.type_column());
            for column in columns {
                let current = entity.read_field(column).cloned().unwrap_or(Value::Null);
                self.check_write(entity, column, &current)?;
            }
        }
        Ok(())
    }

    fn check_write<E: TenantBound + ?Sized>(
        &self,
        entity: &E,
        column: &str,
        value: &Value,
    ) -> TenancyResult<()> {
        if !entity.is_persisted() || self.ctx.is_mutable_tenant() {
            return Ok(());
        }
        match entity.persisted_field(column) {
            None => Ok(()),
            Some(persisted) if same_key(persisted, value) => Ok(()),
            Some(_) => {
                warn!(
                    entity_type = entity.entity_type(),
                    field = column,
                    "rejected change of a persisted tenant key"
                );
                Err(TenantError::TenantIsImmutable {
                    entity_type: entity.entity_type().to_string(),
                    field: column.to_string(),
                }
                .into())
            }
        }
    }

    fn ensure_tenant_optional(&self, spec: &EntityScopeSpec) -> TenancyResult<()> {
        if self.ctx.is_unscoped() || !self.ctx.tenancy().requires_tenant(spec) {
            return Ok(());
        }
        warn!(entity_type = spec.entity_type(), "rejected write without a required tenant");
        Err(TenantError::NoTenantSet {
            entity_type: spec.entity_type().to_string(),
        }
        .into())
    }

    fn dimension(&self, entity_type: &str, name: &str) -> TenancyResult<TenantDimension> {
        let spec = self.ctx.tenancy().spec(entity_type).ok_or_else(|| {
            TenantError::ModelNotScopedByTenant {
                entity_type: entity_type.to_string(),
            }
        })?;
        spec.direct_dimensions()
            .find(|d| d.name() == name)
            .cloned()
            .ok_or_else(|| {
                ConfigError::UnknownDimension {
                    entity_type: entity_type.to_string(),
                    dimension: name.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenancyConfig;
    use crate::error::TenancyError;
    use crate::scope::RegisterOptions;
    use crate::store::Record;
    use crate::tenant::Tenancy;
    use serde_json::json;

    fn context() -> TenantContext {
        let tenancy = Tenancy::new(TenancyConfig::default());
        tenancy
            .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
            .unwrap();
        tenancy
            .register(
                "Comment",
                vec![TenantDimension::polymorphic("commentable")],
                RegisterOptions::new(),
            )
            .unwrap();
        tenancy
            .register(
                "CustomPrimaryKeyTask",
                vec![TenantDimension::belongs_to("account").foreign_key("accountID").primary_key("name")],
                RegisterOptions::new(),
            )
            .unwrap();
        tenancy.context()
    }

    fn persisted_project(account_id: Value) -> Record {
        let mut project = Record::new("Project").with("name", "bar").with("account_id", account_id);
        project.mark_persisted();
        project
    }

    #[test]
    fn test_on_create_assigns_current_tenant() {
        let ctx = context();
        ctx.set_active(TenantRef::new("Account", 1));
        let mut project = Record::new("Project").with("name", "bar");
        MutationGuard::new(&ctx).on_create(&mut project).unwrap();
        assert_eq!(project.get("account_id"), Some(&json!(1)));
    }

    #[test]
    fn test_on_create_keeps_explicit_key() {
        let ctx = context();
        ctx.set_active(TenantRef::new("Account", 1));
        let mut project = Record::new("Project").with("account_id", 2);
        MutationGuard::new(&ctx).on_create(&mut project).unwrap();
        assert_eq!(project.get("account_id"), Some(&json!(2)));
    }

    #[test]
    fn test_on_create_without_tenant() {
        let ctx = context();
        let mut project = Record::new("Project");
        MutationGuard::new(&ctx).on_create(&mut project).unwrap();
        assert_eq!(project.get("account_id"), None);
    }

    #[test]
    fn test_on_create_polymorphic() {
        let ctx = context();
        ctx.set_active(TenantRef::new("Article", 3));
        let mut comment = Record::new("Comment");
        MutationGuard::new(&ctx).on_create(&mut comment).unwrap();
        assert_eq!(comment.get("commentable_id"), Some(&json!(3)));
        assert_eq!(comment.get("commentable_type"), Some(&json!("Article")));
    }

    #[test]
    fn test_on_create_custom_primary_key() {
        let ctx = context();
        ctx.set_active(TenantRef::new("Account", 1).with_attribute("name", "foo"));
        let mut task = Record::new("CustomPrimaryKeyTask");
        MutationGuard::new(&ctx).on_create(&mut task).unwrap();
        assert_eq!(task.get("accountID"), Some(&json!("foo")));
    }

    #[test]
    fn test_new_rows_are_freely_assignable() {
        let ctx = context();
        let mut project = Record::new("Project").with("account_id", 1);
        MutationGuard::new(&ctx)
            .set_tenant_key(&mut project, "account", 2)
            .unwrap();
        assert_eq!(project.get("account_id"), Some(&json!(2)));
    }

    #[test]
    fn test_same_value_is_allowed() {
        let ctx = context();
        let guard = MutationGuard::new(&ctx);
        let mut project = persisted_project(json!(5));
        guard.set_tenant_key(&mut project, "account", 5).unwrap();
        guard.set_tenant_key(&mut project, "account", "5").unwrap();
        guard
            .set_tenant(&mut project, "account", Some(&TenantRef::new("Account", "5")))
            .unwrap();
    }

    #[test]
    fn test_different_value_is_rejected() {
        let ctx = context();
        let guard = MutationGuard::new(&ctx);
        let mut project = persisted_project(json!(5));

        let err = guard.set_tenant_key(&mut project, "account", 6).unwrap_err();
        assert!(err.is_tenant_immutable());
        assert_eq!(project.get("account_id"), Some(&json!(5)));

        let err = guard
            .set_tenant(&mut project, "account", Some(&TenantRef::new("Account", 6)))
            .unwrap_err();
        assert!(err.is_tenant_immutable());

        let err = guard.set_tenant(&mut project, "account", None).unwrap_err();
        assert!(err.is_tenant_immutable());
    }

    #[test]
    fn test_null_persisted_key_may_be_assigned() {
        let ctx = context();
        let mut project = persisted_project(Value::Null);
        MutationGuard::new(&ctx)
            .set_tenant_key(&mut project, "account", 1)
            .unwrap();
        assert_eq!(project.get("account_id"), Some(&json!(1)));
    }

    #[test]
    fn test_mutable_tenant_mode_allows_change() {
        let ctx = context();
        let mut project = persisted_project(json!(5));
        ctx.with_mutable_tenant(|| {
            MutationGuard::new(&ctx)
                .set_tenant_key(&mut project, "account", 6)
                .unwrap();
        });
        assert_eq!(project.get("account_id"), Some(&json!(6)));
    }

    #[test]
    fn test_check_unchanged_catches_raw_writes() {
        let ctx = context();
        let guard = MutationGuard::new(&ctx);
        let mut project = persisted_project(json!(5));
        guard.check_unchanged(&project).unwrap();

        project.set("account_id", "5");
        guard.check_unchanged(&project).unwrap();

        project.set("account_id", 7);
        assert!(guard.check_unchanged(&project).unwrap_err().is_tenant_immutable());
    }

    #[test]
    fn test_polymorphic_type_is_immutable() {
        let ctx = context();
        let guard = MutationGuard::new(&ctx);
        let mut comment = Record::new("Comment")
            .with("commentable_id", 1)
            .with("commentable_type", "Project");
        comment.mark_persisted();

        guard
            .set_tenant(&mut comment, "commentable", Some(&TenantRef::new("Project", 1)))
            .unwrap();
        let err = guard
            .set_tenant(&mut comment, "commentable", Some(&TenantRef::new("Article", 1)))
            .unwrap_err();
        assert!(err.is_tenant_immutable());
    }

    #[test]
    fn test_unknown_dimension() {
        let ctx = context();
        let mut project = Record::new("Project");
        let err = MutationGuard::new(&ctx)
            .set_tenant_key(&mut project, "organization", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Config(ConfigError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn test_wrong_tenant_type_rejected() {
        let ctx = context();
        let mut project = Record::new("Project");
        let err = MutationGuard::new(&ctx)
            .set_tenant(&mut project, "account", Some(&TenantRef::new("Project", 1)))
            .unwrap_err();
        assert!(matches!(err, TenancyError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unregistered_type() {
        let ctx = context();
        let mut record = Record::new("Account");
        let err = MutationGuard::new(&ctx)
            .set_tenant_key(&mut record, "account", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Tenant(TenantError::ModelNotScopedByTenant { .. })
        ));
        MutationGuard::new(&ctx).on_create(&mut record).unwrap();
    }

    #[test]
    fn test_writes_require_tenant_when_configured() {
        let tenancy = Tenancy::new(TenancyConfig::new().with_require_tenant(true));
        tenancy
            .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
            .unwrap();
        let ctx = tenancy.context();
        let guard = MutationGuard::new(&ctx);

        let mut project = Record::new("Project");
        assert!(guard.on_create(&mut project).unwrap_err().is_no_tenant_set());
        assert!(
            guard
                .check_unchanged(&persisted_project(json!(1)))
                .unwrap_err()
                .is_no_tenant_set()
        );

        ctx.without_tenant(|| guard.on_create(&mut project)).unwrap();
        assert_eq!(project.get("account_id"), None);
    }
}
