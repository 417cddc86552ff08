//! Helios Tenancy
//!
//! This crate provides row-level multitenancy for a data-access layer. Given
//! the current tenant of a unit of work, it scopes every read of a registered
//! entity type to that tenant, assigns the tenant to new rows, keeps a row's
//! tenant immutable once persisted, and makes uniqueness and association
//! validation respect tenant boundaries.
//!
//! # Features
//!
//! - **Scoped context**: nested `with_tenant` / `without_tenant` blocks that
//!   restore the previous state on return, error, panic or cancellation
//! - **Default scoping**: one filter predicate per entity type, evaluated in
//!   memory or rendered to SQL
//! - **Global records**: rows without a tenant visible to every tenant
//! - **Multiple dimensions**: entities tied to several tenant types,
//!   polymorphic tenants and tenants reached through join entities
//! - **Job carrier**: capture the tenant when enqueuing, restore it when
//!   the job runs
//!
//! # Architecture
//!
//! - [`tenant`] - tenant identity, per-request context and the [`Tenancy`] root
//! - [`scope`] - entity registration and default-scope predicates
//! - [`validation`] - mutation guard, uniqueness and association checks
//! - [`store`] - records, the storage trait and the scoped [`Repository`](store::Repository)
//! - [`job`] - tenant capture and restore across queues
//! - [`request`] - host based tenant resolution for web layers
//! - [`config`] - configuration
//! - [`error`] - error types
//!
//! # Quick Start
//!
//! ```
//! use helios_tenancy::{Tenancy, TenancyConfig};
//! use helios_tenancy::scope::{RegisterOptions, TenantDimension};
//! use helios_tenancy::store::{MemoryStore, Record, Repository};
//! use helios_tenancy::tenant::TenantRef;
//!
//! let tenancy = Tenancy::new(TenancyConfig::default());
//! tenancy
//!     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
//!     .unwrap();
//!
//! let repo = Repository::new(tenancy.clone(), MemoryStore::new());
//! let ctx = tenancy.context();
//! let account = TenantRef::new("Account", 1);
//!
//! // New rows pick up the current tenant
//! let project = ctx
//!     .with_tenant(account.clone(), || repo.create(&ctx, Record::new("Project").with("name", "bar")))
//!     .unwrap();
//! assert_eq!(project.get("account_id"), Some(&serde_json::json!(1)));
//!
//! // Reads only see the current tenant's rows
//! ctx.with_tenant(TenantRef::new("Account", 2), || {
//!     assert!(repo.all("Project", &ctx).unwrap().is_empty());
//! });
//! ctx.with_tenant(account, || {
//!     assert_eq!(repo.all("Project", &ctx).unwrap().len(), 1);
//! });
//! ```
//!
//! # Requiring a Tenant
//!
//! ```
//! use helios_tenancy::{Tenancy, TenancyConfig};
//! use helios_tenancy::scope::{RegisterOptions, TenantDimension};
//! use helios_tenancy::store::{MemoryStore, Repository};
//!
//! let tenancy = Tenancy::new(TenancyConfig::new().with_require_tenant(true));
//! tenancy
//!     .register("Project", vec![TenantDimension::belongs_to("account")], RegisterOptions::new())
//!     .unwrap();
//! let repo = Repository::new(tenancy.clone(), MemoryStore::new());
//! let ctx = tenancy.context();
//!
//! assert!(repo.all("Project", &ctx).unwrap_err().is_no_tenant_set());
//! assert!(ctx.without_tenant(|| repo.all("Project", &ctx)).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod job;
pub mod request;
pub mod scope;
pub mod store;
pub mod tenant;
pub mod validation;

// Re-export commonly used types at crate root
pub use config::{RequireTenant, TenancyConfig};
pub use error::{TenancyError, TenancyResult};
pub use tenant::{Tenancy, TenantContext, TenantRef};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
