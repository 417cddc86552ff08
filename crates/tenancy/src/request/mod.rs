//! Request-boundary helpers.
//!
//! A web layer resolves the tenant of each request and makes it active on
//! the request's [`TenantContext`]. This module provides the host based
//! resolution strategies, the guard that hides a test tenant from request
//! handling, and a read accessor for handlers and templates.
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::{Tenancy, TenancyConfig};
//! use helios_tenancy::request::{HostTenantResolver, TenantSource, current_tenant};
//! use helios_tenancy::store::{MemoryStore, Record, RecordStore};
//! use helios_tenancy::tenant::TenantRef;
//!
//! let store = MemoryStore::new();
//! store.insert(Record::new("Account").with("subdomain", "foo")).unwrap();
//!
//! let ctx = Tenancy::new(TenancyConfig::default()).context();
//! let resolver = HostTenantResolver::by_subdomain("Account");
//! let resolved = resolver.apply(&ctx, "FOO.example.com:3000", &store).unwrap();
//!
//! assert_eq!(resolved.source, TenantSource::Subdomain);
//! assert_eq!(current_tenant(&ctx), Some(TenantRef::new("Account", 1)));
//! ```

mod guard;
mod resolver;

pub use guard::{TestTenantGuard, without_test_tenant};
pub use resolver::{HostTenantResolver, ResolvedTenant, SubdomainLookup, TenantSource, domain, subdomains};

use crate::tenant::{TenantContext, TenantRef};

/// Finds tenant rows by an arbitrary column, for host based resolution.
///
/// Like [`TenantLocator`](crate::job::TenantLocator), lookups must not be
/// tenant scoped.
pub trait TenantFinder: Send + Sync {
    /// Returns the tenant whose `column` equals `value`.
    fn find_by(&self, tenant_type: &str, column: &str, value: &str) -> Option<TenantRef>;
}

/// Returns the current tenant of a request, for handlers and templates.
pub fn current_tenant(ctx: &TenantContext) -> Option<TenantRef> {
    ctx.current()
}
