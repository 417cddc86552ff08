//! Hiding the test tenant from request handling.

use std::future::Future;

use crate::tenant::{TenantContext, TenantRef};

/// Clears a context's test override until dropped.
///
/// Test setup often pins a tenant with
/// [`set_test_override`](TenantContext::set_test_override) so fixtures can be
/// created. Requests made by the test must still resolve their own tenant,
/// so the override is hidden while the request is handled and put back
/// afterward.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::request::TestTenantGuard;
/// use helios_tenancy::tenant::TenantRef;
///
/// let ctx = Tenancy::new(TenancyConfig::default()).context();
/// ctx.set_test_override(TenantRef::new("Account", 1));
/// {
///     let _guard = TestTenantGuard::new(&ctx);
///     assert_eq!(ctx.current(), None);
/// }
/// assert_eq!(ctx.current(), Some(TenantRef::new("Account", 1)));
/// ```
#[derive(Debug)]
pub struct TestTenantGuard<'a> {
    ctx: &'a TenantContext,
    saved: Option<TenantRef>,
}

impl<'a> TestTenantGuard<'a> {
    /// Clears the test override, remembering it.
    pub fn new(ctx: &'a TenantContext) -> Self {
        let saved = ctx.test_override();
        ctx.set_test_override(None);
        Self { ctx, saved }
    }
}

impl Drop for TestTenantGuard<'_> {
    fn drop(&mut self) {
        self.ctx.set_test_override(self.saved.take());
    }
}

/// Handles a request with the test override hidden.
pub async fn without_test_tenant<F: Future>(ctx: &TenantContext, request: F) -> F::Output {
    let _guard = TestTenantGuard::new(ctx);
    request.await
}
