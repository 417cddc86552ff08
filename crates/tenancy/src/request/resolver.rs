//! Tenant resolution from the request host.

use std::fmt;
use std::net::IpAddr;

use regex::Regex;
use tracing::debug;

use crate::error::{ConfigError, TenancyResult};
use crate::tenant::{TenantContext, TenantRef};

use super::TenantFinder;

/// How a request's tenant was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantSource {
    /// Looked up by a subdomain of the host.
    Subdomain,
    /// Looked up by the host's domain.
    Domain,
    /// Set by application code.
    Filter,
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSource::Subdomain => write!(f, "subdomain"),
            TenantSource::Domain => write!(f, "domain"),
            TenantSource::Filter => write!(f, "filter"),
        }
    }
}

/// Result of resolving a request's tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTenant {
    /// The resolved tenant.
    pub tenant: TenantRef,
    /// Where it came from.
    pub source: TenantSource,
}

impl ResolvedTenant {
    /// Wraps a tenant chosen by application code.
    pub fn from_filter(tenant: TenantRef) -> Self {
        Self {
            tenant,
            source: TenantSource::Filter,
        }
    }

    /// Makes the tenant active on a request context.
    pub fn apply(&self, ctx: &TenantContext) {
        debug!(tenant = %self.tenant, source = %self.source, "request tenant resolved");
        ctx.set_active(self.tenant.clone());
    }
}

/// Which subdomain identifies the tenant when a host has several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubdomainLookup {
    /// The leftmost subdomain.
    First,
    /// The subdomain closest to the domain.
    #[default]
    Last,
}

/// Resolves tenants from request host names.
///
/// The subdomain is lower-cased before lookup. In subdomain-or-domain mode a
/// host without subdomains is looked up by its domain instead.
#[derive(Debug, Clone)]
pub struct HostTenantResolver {
    tenant_type: String,
    subdomain_column: String,
    domain_column: Option<String>,
    lookup: SubdomainLookup,
    tld_length: usize,
    subdomain_pattern: Option<Regex>,
}

impl HostTenantResolver {
    /// Resolves by subdomain, matched against the tenant's `subdomain` column.
    pub fn by_subdomain(tenant_type: impl Into<String>) -> Self {
        Self {
            tenant_type: tenant_type.into(),
            subdomain_column: "subdomain".to_string(),
            domain_column: None,
            lookup: SubdomainLookup::Last,
            tld_length: 1,
            subdomain_pattern: None,
        }
    }

    /// Resolves by subdomain, falling back to the tenant's `domain` column.
    pub fn by_subdomain_or_domain(tenant_type: impl Into<String>) -> Self {
        Self {
            domain_column: Some("domain".to_string()),
            ..Self::by_subdomain(tenant_type)
        }
    }

    /// Sets the column subdomains are matched against.
    pub fn with_subdomain_column(mut self, column: impl Into<String>) -> Self {
        self.subdomain_column = column.into();
        self
    }

    /// Sets the column domains are matched against.
    pub fn with_domain_column(mut self, column: impl Into<String>) -> Self {
        self.domain_column = Some(column.into());
        self
    }

    /// Chooses which subdomain identifies the tenant.
    pub fn with_lookup(mut self, lookup: SubdomainLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Sets the number of labels in the top-level domain (`co.uk` is 2).
    pub fn with_tld_length(mut self, tld_length: usize) -> Self {
        self.tld_length = tld_length;
        self
    }

    /// Ignores subdomains that do not match `pattern`.
    pub fn with_subdomain_pattern(mut self, pattern: &str) -> TenancyResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::Invalid {
            message: format!("invalid subdomain pattern: {e}"),
        })?;
        self.subdomain_pattern = Some(regex);
        Ok(self)
    }

    /// Resolves the tenant of a host without touching any context.
    pub fn resolve<F: TenantFinder + ?Sized>(&self, host: &str, finder: &F) -> Option<ResolvedTenant> {
        let (source, column, value) = self.lookup_key(host)?;
        finder
            .find_by(&self.tenant_type, column, &value)
            .map(|tenant| ResolvedTenant { tenant, source })
    }

    /// Resolves the tenant of a host and makes it the context's active tenant.
    ///
    /// When the host yields a lookup key the active tenant is replaced, with
    /// `None` if no tenant matched. A host that yields no key leaves the
    /// context untouched.
    pub fn apply<F: TenantFinder + ?Sized>(
        &self,
        ctx: &TenantContext,
        host: &str,
        finder: &F,
    ) -> Option<ResolvedTenant> {
        let (source, column, value) = self.lookup_key(host)?;
        let resolved = finder
            .find_by(&self.tenant_type, column, &value)
            .map(|tenant| ResolvedTenant { tenant, source });
        match &resolved {
            Some(resolved) => resolved.apply(ctx),
            None => {
                debug!(host, source = %source, "no tenant matches request host");
                ctx.set_active(None);
            }
        }
        resolved
    }

    fn lookup_key(&self, host: &str) -> Option<(TenantSource, &str, String)> {
        let subdomains = subdomains(host, self.tld_length);
        let subdomain = match self.lookup {
            SubdomainLookup::First => subdomains.first(),
            SubdomainLookup::Last => subdomains.last(),
        }
        .filter(|s| !s.is_empty());

        if let Some(subdomain) = subdomain {
            let subdomain = subdomain.to_lowercase();
            if self
                .subdomain_pattern
                .as_ref()
                .is_some_and(|pattern| !pattern.is_match(&subdomain))
            {
                return None;
            }
            return Some((TenantSource::Subdomain, self.subdomain_column.as_str(), subdomain));
        }

        let column = self.domain_column.as_deref()?;
        let domain = domain(host, self.tld_length)?;
        Some((TenantSource::Domain, column, domain))
    }
}

/// Strips the port from a host header value.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) && !name.contains(':') => {
            name
        }
        _ => host,
    }
}

fn labels(host: &str) -> Option<Vec<&str>> {
    let host = strip_port(host).trim_end_matches('.');
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return None;
    }
    Some(host.split('.').collect())
}

/// Returns the subdomains of a host, leftmost first.
///
/// IP addresses have no subdomains.
///
/// ```
/// use helios_tenancy::request::subdomains;
///
/// assert_eq!(subdomains("www.foo.example.com", 1), vec!["www", "foo"]);
/// assert!(subdomains("example.com:8080", 1).is_empty());
/// assert!(subdomains("127.0.0.1", 1).is_empty());
/// ```
pub fn subdomains(host: &str, tld_length: usize) -> Vec<&str> {
    match labels(host) {
        Some(labels) if labels.len() > tld_length + 1 => {
            labels[..labels.len() - tld_length - 1].to_vec()
        }
        _ => Vec::new(),
    }
}

/// Returns the registrable domain of a host, lower-cased.
///
/// ```
/// use helios_tenancy::request::domain;
///
/// assert_eq!(domain("www.Example.com", 1).as_deref(), Some("example.com"));
/// assert_eq!(domain("foo.co.uk", 2).as_deref(), Some("foo.co.uk"));
/// assert_eq!(domain("10.0.0.1", 1), None);
/// ```
pub fn domain(host: &str, tld_length: usize) -> Option<String> {
    let labels = labels(host)?;
    let start = labels.len().saturating_sub(tld_length + 1);
    Some(labels[start..].join(".").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenancyConfig;
    use crate::store::{MemoryStore, Record, RecordStore};
    use crate::tenant::Tenancy;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                Record::new("Account")
                    .with("subdomain", "foo")
                    .with("domain", "foo.com"),
            )
            .unwrap();
        store
            .insert(Record::new("Account").with("subdomain", "bar"))
            .unwrap();
        store
    }

    #[test]
    fn test_source_display() {
        assert_eq!(TenantSource::Subdomain.to_string(), "subdomain");
        assert_eq!(TenantSource::Domain.to_string(), "domain");
        assert_eq!(TenantSource::Filter.to_string(), "filter");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("foo.example.com:3000"), "foo.example.com");
        assert_eq!(strip_port("foo.example.com"), "foo.example.com");
        assert_eq!(strip_port("[::1]:3000"), "::1");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn test_subdomains() {
        assert_eq!(subdomains("foo.example.com", 1), vec!["foo"]);
        assert_eq!(subdomains("a.b.example.co.uk", 2), vec!["a", "b"]);
        assert!(subdomains("localhost", 1).is_empty());
        assert!(subdomains("[::1]:3000", 1).is_empty());
    }

    #[test]
    fn test_resolve_last_subdomain_lowercased() {
        let resolver = HostTenantResolver::by_subdomain("Account");
        let resolved = resolver.resolve("www.FOO.example.com", &store()).unwrap();
        assert_eq!(resolved.tenant, TenantRef::new("Account", 1));
        assert_eq!(resolved.source, TenantSource::Subdomain);
    }

    #[test]
    fn test_resolve_first_subdomain() {
        let resolver = HostTenantResolver::by_subdomain("Account").with_lookup(SubdomainLookup::First);
        let resolved = resolver.resolve("bar.foo.example.com", &store()).unwrap();
        assert_eq!(resolved.tenant, TenantRef::new("Account", 2));
    }

    #[test]
    fn test_subdomain_mode_ignores_bare_domain() {
        let resolver = HostTenantResolver::by_subdomain("Account");
        assert_eq!(resolver.resolve("foo.com", &store()), None);
    }

    #[test]
    fn test_domain_fallback() {
        let resolver = HostTenantResolver::by_subdomain_or_domain("Account");
        let resolved = resolver.resolve("foo.com", &store()).unwrap();
        assert_eq!(resolved.tenant, TenantRef::new("Account", 1));
        assert_eq!(resolved.source, TenantSource::Domain);
    }

    #[test]
    fn test_subdomain_pattern() {
        let resolver = HostTenantResolver::by_subdomain("Account")
            .with_subdomain_pattern("^[a-z]+$")
            .unwrap();
        assert!(resolver.resolve("foo.example.com", &store()).is_some());
        assert_eq!(resolver.resolve("foo-1.example.com", &store()), None);

        assert!(
            HostTenantResolver::by_subdomain("Account")
                .with_subdomain_pattern("(")
                .is_err()
        );
    }

    #[test]
    fn test_apply_sets_and_clears_active() {
        let ctx = Tenancy::new(TenancyConfig::default()).context();
        let store = store();
        let resolver = HostTenantResolver::by_subdomain("Account");

        resolver.apply(&ctx, "foo.example.com", &store);
        assert_eq!(ctx.current(), Some(TenantRef::new("Account", 1)));

        assert_eq!(resolver.apply(&ctx, "unknown.example.com", &store), None);
        assert_eq!(ctx.current(), None);

        ctx.set_active(TenantRef::new("Account", 2));
        assert_eq!(resolver.apply(&ctx, "example.com", &store), None);
        assert_eq!(ctx.current(), Some(TenantRef::new("Account", 2)));
    }

    #[test]
    fn test_filter_source() {
        let ctx = Tenancy::new(TenancyConfig::default()).context();
        let resolved = ResolvedTenant::from_filter(TenantRef::new("Account", 7));
        resolved.apply(&ctx);
        assert_eq!(ctx.current(), Some(TenantRef::new("Account", 7)));
        assert_eq!(resolved.source, TenantSource::Filter);
    }
}
