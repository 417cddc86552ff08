//! The tenancy root object.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::TenancyConfig;
use crate::error::{TenancyResult, TenantError};
use crate::scope::{EntityScopeSpec, RegisterOptions, ScopeRegistry, TenantDimension};
use crate::validation::{UniqueConstraint, UniqueOptions};

use super::context::TenantContext;
use super::id::TenantRef;

/// Configuration snapshot, entity registry and default tenant.
///
/// A `Tenancy` is built once at startup and shared as `Arc<Tenancy>`. Each
/// request or job obtains its own [`TenantContext`] from it.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::scope::{RegisterOptions, TenantDimension};
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// tenancy
///     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
///     .unwrap();
/// assert!(tenancy.is_scoped_by_tenant("Project"));
/// assert!(!tenancy.is_scoped_by_tenant("Account"));
/// ```
pub struct Tenancy {
    config: TenancyConfig,
    registry: ScopeRegistry,
    default_tenant: RwLock<Option<TenantRef>>,
}

impl Tenancy {
    /// Creates a tenancy from a configuration snapshot.
    pub fn new(config: TenancyConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: ScopeRegistry::new(),
            default_tenant: RwLock::new(None),
        })
    }

    /// Creates an empty context for one unit of work.
    pub fn context(self: &Arc<Self>) -> TenantContext {
        TenantContext::new(Arc::clone(self))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Registers an entity type with its tenant dimensions.
    ///
    /// Registering the same definition twice is a no-op; registering a
    /// different definition for a known type fails.
    pub fn register(
        &self,
        entity_type: impl Into<String>,
        dimensions: Vec<TenantDimension>,
        options: RegisterOptions,
    ) -> TenancyResult<()> {
        let entity_type = entity_type.into();
        let spec = EntityScopeSpec::new(entity_type.clone(), dimensions, options);
        if self.registry.insert(spec)? {
            info!(entity_type = %entity_type, "registered tenant-scoped entity type");
        }
        Ok(())
    }

    /// Declares fields that must be unique within a tenant.
    ///
    /// Each field is checked independently. Fails with
    /// [`TenantError::ModelNotScopedByTenant`] if the type is not registered.
    pub fn validates_uniqueness_to_tenant(
        &self,
        entity_type: &str,
        fields: &[&str],
        options: UniqueOptions,
    ) -> TenancyResult<()> {
        if !self.is_scoped_by_tenant(entity_type) {
            return Err(TenantError::ModelNotScopedByTenant {
                entity_type: entity_type.to_string(),
            }
            .into());
        }
        for field in fields {
            self.registry
                .add_unique(entity_type, UniqueConstraint::new(*field, options.clone()));
        }
        Ok(())
    }

    /// Returns the registered scoping of an entity type.
    pub fn spec(&self, entity_type: &str) -> Option<Arc<EntityScopeSpec>> {
        self.registry.get(entity_type)
    }

    /// Returns the uniqueness constraints declared for an entity type.
    pub fn unique_constraints(&self, entity_type: &str) -> Vec<UniqueConstraint> {
        self.registry.unique_constraints(entity_type)
    }

    /// Returns `true` if the entity type is registered.
    pub fn is_scoped_by_tenant(&self, entity_type: &str) -> bool {
        self.registry.get(entity_type).is_some()
    }

    /// Returns the registered types that allow global records, sorted by name.
    pub fn models_with_global_records(&self) -> Vec<String> {
        self.registry
            .all()
            .into_iter()
            .filter(|spec| spec.allows_global_records())
            .map(|spec| spec.entity_type().to_string())
            .collect()
    }

    /// Returns the effective tenant requirement for an entity type.
    ///
    /// A per-entity override replaces the global policy.
    pub fn requires_tenant(&self, spec: &EntityScopeSpec) -> bool {
        spec.require_tenant_override()
            .unwrap_or(&self.config.require_tenant)
            .evaluate()
    }

    /// Returns the primary key field of an entity type.
    pub fn primary_key_of(&self, entity_type: &str) -> String {
        self.spec(entity_type)
            .and_then(|spec| spec.primary_key().map(str::to_string))
            .unwrap_or_else(|| self.config.primary_key_name.clone())
    }

    /// Returns the process-wide default tenant.
    pub fn default_tenant(&self) -> Option<TenantRef> {
        self.default_tenant.read().clone()
    }

    /// Sets the process-wide default tenant.
    pub fn set_default_tenant(&self, tenant: impl Into<Option<TenantRef>>) {
        *self.default_tenant.write() = tenant.into();
    }
}

impl fmt::Debug for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenancy")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("default_tenant", &*self.default_tenant.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequireTenant;
    use crate::error::{ConfigError, TenancyError};

    fn tenancy() -> Arc<Tenancy> {
        Tenancy::new(TenancyConfig::default())
    }

    #[test]
    fn test_register_is_idempotent() {
        let tenancy = tenancy();
        let dims = || vec![TenantDimension::belongs_to("account")];
        tenancy.register("Project", dims(), RegisterOptions::new()).unwrap();
        tenancy.register("Project", dims(), RegisterOptions::new()).unwrap();
        assert!(tenancy.is_scoped_by_tenant("Project"));
    }

    #[test]
    fn test_register_conflicting_definition_fails() {
        let tenancy = tenancy();
        tenancy
            .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
            .unwrap();
        let err = tenancy
            .register(
                "Project",
                vec![TenantDimension::belongs_to("organization")],
                RegisterOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Config(ConfigError::DuplicateRegistration { .. })
        ));
        assert_eq!(
            tenancy.spec("Project").unwrap().dimensions()[0].name(),
            "account"
        );
    }

    #[test]
    fn test_uniqueness_requires_registration() {
        let tenancy = tenancy();
        let err = tenancy
            .validates_uniqueness_to_tenant("Article", &["title"], UniqueOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::Tenant(TenantError::ModelNotScopedByTenant { .. })
        ));

        tenancy
            .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
            .unwrap();
        tenancy
            .validates_uniqueness_to_tenant("Project", &["name", "code"], UniqueOptions::default())
            .unwrap();
        assert_eq!(tenancy.unique_constraints("Project").len(), 2);
    }

    #[test]
    fn test_models_with_global_records() {
        let tenancy = tenancy();
        let account = || vec![TenantDimension::belongs_to("account")];
        tenancy
            .register("UniqueThing", account(), RegisterOptions::new().global_records())
            .unwrap();
        tenancy.register("Project", account(), RegisterOptions::new()).unwrap();
        tenancy
            .register("GlobalProject", account(), RegisterOptions::new().global_records())
            .unwrap();

        assert_eq!(
            tenancy.models_with_global_records(),
            vec!["GlobalProject".to_string(), "UniqueThing".to_string()]
        );
    }

    #[test]
    fn test_requires_tenant_override() {
        let tenancy = Tenancy::new(TenancyConfig::new().with_require_tenant(true));
        let account = || vec![TenantDimension::belongs_to("account")];
        tenancy.register("Project", account(), RegisterOptions::new()).unwrap();
        tenancy
            .register(
                "Article",
                account(),
                RegisterOptions::new().require_tenant(RequireTenant::dynamic(|| false)),
            )
            .unwrap();

        assert!(tenancy.requires_tenant(&tenancy.spec("Project").unwrap()));
        assert!(!tenancy.requires_tenant(&tenancy.spec("Article").unwrap()));
    }

    #[test]
    fn test_primary_key_of() {
        let tenancy = Tenancy::new(TenancyConfig::new().with_primary_key_name("uuid"));
        tenancy
            .register(
                "Country",
                vec![TenantDimension::belongs_to("account")],
                RegisterOptions::new().primary_key("code"),
            )
            .unwrap();
        assert_eq!(tenancy.primary_key_of("Country"), "code");
        assert_eq!(tenancy.primary_key_of("Project"), "uuid");
    }

    #[test]
    fn test_default_tenant() {
        let tenancy = tenancy();
        assert_eq!(tenancy.default_tenant(), None);
        tenancy.set_default_tenant(TenantRef::new("Account", 1));
        assert_eq!(tenancy.default_tenant(), Some(TenantRef::new("Account", 1)));
        tenancy.set_default_tenant(None);
        assert_eq!(tenancy.default_tenant(), None);
    }
}
