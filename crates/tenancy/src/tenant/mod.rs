//! Tenant identity and context.
//!
//! # Core Types
//!
//! - [`TenantRef`] - the identity of a tenant row (type name and key)
//! - [`TenantContext`] - the mutable "current tenant" of one unit of work
//! - [`Tenancy`] - configuration, entity registry and default tenant
//! - [`TenantBound`] - rows whose tenant keys the guards read and write
//!
//! # Resolution Order
//!
//! The current tenant of a context is, in order: the explicitly active
//! tenant, the test override, and finally the process-wide default tenant
//! unless the context is unscoped or fallback is disabled.
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::{Tenancy, TenancyConfig};
//! use helios_tenancy::tenant::TenantRef;
//!
//! let tenancy = Tenancy::new(TenancyConfig::default());
//! let ctx = tenancy.context();
//!
//! ctx.with_tenant(TenantRef::new("Account", 1), || {
//!     assert_eq!(ctx.current(), Some(TenantRef::new("Account", 1)));
//!
//!     ctx.with_tenant(TenantRef::new("Account", 2), || {
//!         assert_eq!(ctx.current(), Some(TenantRef::new("Account", 2)));
//!     });
//!
//!     assert_eq!(ctx.current(), Some(TenantRef::new("Account", 1)));
//! });
//!
//! assert_eq!(ctx.current(), None);
//! ```

mod bound;
mod context;
mod id;
mod tenancy;

pub use bound::TenantBound;
pub use context::TenantContext;
pub use id::{TenantModel, TenantRef, same_key};
pub(crate) use id::key_to_string;
pub use tenancy::Tenancy;
