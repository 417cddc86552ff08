//! Tenancy configuration.
//!
//! [`TenancyConfig`] is an immutable snapshot taken when a
//! [`Tenancy`](crate::Tenancy) is built. Plain settings deserialize with serde;
//! callables (the change hook and a dynamic tenant requirement) are attached
//! with builder methods.
//!
//! # Example
//!
//! ```
//! use helios_tenancy::config::{RequireTenant, TenancyConfig};
//!
//! let config: TenancyConfig = serde_json::from_str(r#"{"require_tenant": true}"#).unwrap();
//! assert!(config.require_tenant.evaluate());
//! assert_eq!(config.primary_key_name, "id");
//!
//! let config = TenancyConfig::new()
//!     .with_require_tenant(RequireTenant::dynamic(|| false))
//!     .with_tenant_change_hook(|tenant| {
//!         let _ = tenant;
//!     });
//! assert!(!config.require_tenant.evaluate());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::scope::Predicate;
use crate::tenant::TenantRef;

/// Callback invoked whenever the active tenant changes value.
pub type TenantChangeHook = Arc<dyn Fn(Option<&TenantRef>) + Send + Sync>;

/// Whether scoped reads require a tenant to be present.
///
/// A dynamic requirement is re-evaluated on every scoped read, so it must be
/// cheap and free of side effects.
#[derive(Clone)]
pub enum RequireTenant {
    /// A fixed policy.
    Static(bool),
    /// A policy evaluated per call.
    Dynamic(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl RequireTenant {
    /// Wraps a callable policy.
    pub fn dynamic(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        RequireTenant::Dynamic(Arc::new(f))
    }

    /// Evaluates the policy.
    pub fn evaluate(&self) -> bool {
        match self {
            RequireTenant::Static(required) => *required,
            RequireTenant::Dynamic(f) => f(),
        }
    }
}

impl Default for RequireTenant {
    fn default() -> Self {
        RequireTenant::Static(false)
    }
}

impl From<bool> for RequireTenant {
    fn from(required: bool) -> Self {
        RequireTenant::Static(required)
    }
}

impl fmt::Debug for RequireTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequireTenant::Static(required) => write!(f, "Static({required})"),
            RequireTenant::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for RequireTenant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(|v| RequireTenant::Static(v.unwrap_or(false)))
    }
}

/// Configuration for a [`Tenancy`](crate::Tenancy).
#[derive(Clone, Deserialize)]
pub struct TenancyConfig {
    /// Whether scoped reads fail without a tenant.
    #[serde(default)]
    pub require_tenant: RequireTenant,

    /// Whether the process-wide default tenant may be used as a fallback.
    #[serde(default = "default_true")]
    pub allow_fallback: bool,

    /// Default primary key field on tenant and entity types.
    ///
    /// Stores built with [`MemoryStore::for_tenancy`](crate::store::MemoryStore::for_tenancy)
    /// key rows by it, and predicates built without a store reference it.
    #[serde(default = "default_primary_key_name")]
    pub primary_key_name: String,

    /// Invoked after the active tenant changes value.
    #[serde(skip)]
    pub tenant_change_hook: Option<TenantChangeHook>,

    /// Row filter applied when a job restores its tenant.
    ///
    /// `None` looks the tenant up without any restriction.
    #[serde(skip)]
    pub job_restore_scope: Option<Predicate>,
}

fn default_true() -> bool {
    true
}

fn default_primary_key_name() -> String {
    "id".to_string()
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            require_tenant: RequireTenant::default(),
            allow_fallback: true,
            primary_key_name: default_primary_key_name(),
            tenant_change_hook: None,
            job_restore_scope: None,
        }
    }
}

impl TenancyConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant requirement policy.
    pub fn with_require_tenant(mut self, require: impl Into<RequireTenant>) -> Self {
        self.require_tenant = require.into();
        self
    }

    /// Enables or disables the default-tenant fallback.
    pub fn with_allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    /// Sets the default primary key field name.
    pub fn with_primary_key_name(mut self, name: impl Into<String>) -> Self {
        self.primary_key_name = name.into();
        self
    }

    /// Registers the tenant change hook.
    pub fn with_tenant_change_hook(
        mut self,
        hook: impl Fn(Option<&TenantRef>) + Send + Sync + 'static,
    ) -> Self {
        self.tenant_change_hook = Some(Arc::new(hook));
        self
    }

    /// Sets the row filter used when jobs restore their tenant.
    pub fn with_job_restore_scope(mut self, scope: Predicate) -> Self {
        self.job_restore_scope = Some(scope);
        self
    }
}

impl fmt::Debug for TenancyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenancyConfig")
            .field("require_tenant", &self.require_tenant)
            .field("allow_fallback", &self.allow_fallback)
            .field("primary_key_name", &self.primary_key_name)
            .field("tenant_change_hook", &self.tenant_change_hook.is_some())
            .field("job_restore_scope", &self.job_restore_scope)
            .finish()
    }
}
