//! Per-unit-of-work tenant context.
//!
//! A [`TenantContext`] holds the mutable "current tenant" state of one
//! request, job or explicit block. Scoped blocks save the state they change
//! and restore it through a drop guard, so restoration also happens when the
//! body returns an error, panics, or (for async blocks) is cancelled.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::id::TenantRef;
use super::tenancy::Tenancy;

tokio::task_local! {
    static TASK_CONTEXT: TenantContext;
}

#[derive(Debug, Clone, Default)]
struct ContextState {
    active: Option<TenantRef>,
    test_override: Option<TenantRef>,
    unscoped: bool,
    mutable_tenant: bool,
}

struct ContextInner {
    tenancy: Arc<Tenancy>,
    state: Mutex<ContextState>,
}

/// The tenant state of one unit of work.
///
/// `TenantContext` is a cheap handle; clones share the same state. Obtain a
/// fresh one per request or job from [`Tenancy::context`] and never share it
/// between concurrently running units of work.
///
/// # Scoped Blocks
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::tenant::TenantRef;
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// let ctx = tenancy.context();
/// ctx.set_active(TenantRef::new("Account", 1));
///
/// let seen = ctx.without_tenant(|| ctx.current());
/// assert_eq!(seen, None);
/// assert_eq!(ctx.current(), Some(TenantRef::new("Account", 1)));
/// ```
#[derive(Clone)]
pub struct TenantContext {
    inner: Arc<ContextInner>,
}

impl TenantContext {
    /// Creates an empty context bound to a tenancy.
    pub fn new(tenancy: Arc<Tenancy>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                tenancy,
                state: Mutex::new(ContextState::default()),
            }),
        }
    }

    /// Returns the tenancy this context belongs to.
    pub fn tenancy(&self) -> &Arc<Tenancy> {
        &self.inner.tenancy
    }

    /// Resolves the current tenant.
    ///
    /// Returns the active tenant, else the test override, else the default
    /// tenant when the context is not unscoped and fallback is allowed.
    pub fn current(&self) -> Option<TenantRef> {
        let state = self.inner.state.lock();
        if let Some(active) = &state.active {
            return Some(active.clone());
        }
        if let Some(test) = &state.test_override {
            return Some(test.clone());
        }
        let unscoped = state.unscoped;
        drop(state);

        if unscoped || !self.inner.tenancy.config().allow_fallback {
            return None;
        }
        self.inner.tenancy.default_tenant()
    }

    /// Returns the explicitly active tenant, ignoring fallbacks.
    pub fn active(&self) -> Option<TenantRef> {
        self.inner.state.lock().active.clone()
    }

    /// Returns the test override.
    pub fn test_override(&self) -> Option<TenantRef> {
        self.inner.state.lock().test_override.clone()
    }

    /// Returns `true` inside a [`without_tenant`](Self::without_tenant) block.
    pub fn is_unscoped(&self) -> bool {
        self.inner.state.lock().unscoped
    }

    /// Returns `true` if persisted tenant keys may currently be rewritten.
    pub fn is_mutable_tenant(&self) -> bool {
        self.inner.state.lock().mutable_tenant
    }

    /// Sets the active tenant.
    ///
    /// The tenant change hook runs after the new value is stored, and only
    /// when the value actually changed.
    pub fn set_active(&self, tenant: impl Into<Option<TenantRef>>) {
        let tenant = tenant.into();
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.active != tenant;
            state.active = tenant.clone();
            changed
        };

        if changed {
            match &tenant {
                Some(t) => debug!(tenant_type = t.type_name(), tenant = %t, "active tenant set"),
                None => debug!("active tenant cleared"),
            }
            if let Some(hook) = &self.inner.tenancy.config().tenant_change_hook {
                hook(tenant.as_ref());
            }
        }
    }

    /// Sets the process-wide default tenant of the owning [`Tenancy`].
    pub fn set_default(&self, tenant: impl Into<Option<TenantRef>>) {
        self.inner.tenancy.set_default_tenant(tenant);
    }

    /// Sets the test override.
    pub fn set_test_override(&self, tenant: impl Into<Option<TenantRef>>) {
        self.inner.state.lock().test_override = tenant.into();
    }

    /// Sets the unscoped flag directly.
    pub fn set_unscoped(&self, unscoped: bool) {
        self.inner.state.lock().unscoped = unscoped;
    }

    fn set_mutable_tenant(&self, mutable: bool) {
        self.inner.state.lock().mutable_tenant = mutable;
    }

    /// Runs `body` with `tenant` active, restoring the previous active tenant afterward.
    pub fn with_tenant<R>(&self, tenant: impl Into<Option<TenantRef>>, body: impl FnOnce() -> R) -> R {
        let _restore = self.enter_tenant(tenant.into());
        body()
    }

    /// Runs `body` with no active tenant and all fallbacks suppressed.
    ///
    /// A read that would fail for lack of a tenant succeeds inside this block
    /// and sees every row.
    pub fn without_tenant<R>(&self, body: impl FnOnce() -> R) -> R {
        let _restore = self.enter_unscoped();
        body()
    }

    /// Runs `body` unscoped, with persisted tenant keys made rewritable.
    pub fn with_mutable_tenant<R>(&self, body: impl FnOnce() -> R) -> R {
        let _unscoped = self.enter_unscoped();
        let _mutable = self.enter_mutable();
        body()
    }

    /// Async counterpart of [`with_tenant`](Self::with_tenant).
    ///
    /// The previous tenant is restored when the future completes or is dropped.
    pub async fn with_tenant_async<F: Future>(
        &self,
        tenant: impl Into<Option<TenantRef>>,
        body: F,
    ) -> F::Output {
        let _restore = self.enter_tenant(tenant.into());
        body.await
    }

    /// Async counterpart of [`without_tenant`](Self::without_tenant).
    pub async fn without_tenant_async<F: Future>(&self, body: F) -> F::Output {
        let _restore = self.enter_unscoped();
        body.await
    }

    /// Binds this context to the current tokio task for the duration of `body`.
    ///
    /// Inside `body`, [`TenantContext::current_task`] returns this context.
    pub async fn scope<F: Future>(self, body: F) -> F::Output {
        TASK_CONTEXT.scope(self, body).await
    }

    /// Synchronous form of [`scope`](Self::scope).
    pub fn sync_scope<R>(self, body: impl FnOnce() -> R) -> R {
        TASK_CONTEXT.sync_scope(self, body)
    }

    /// Returns the context bound to the running task, if any.
    pub fn current_task() -> Option<TenantContext> {
        TASK_CONTEXT.try_with(Clone::clone).ok()
    }

    fn enter_tenant(&self, tenant: Option<TenantRef>) -> Restore<'_> {
        let saved = self.active();
        self.set_active(tenant);
        Restore {
            ctx: self,
            saved: Saved::Active(saved),
        }
    }

    fn enter_unscoped(&self) -> Restore<'_> {
        let (active, unscoped) = {
            let state = self.inner.state.lock();
            (state.active.clone(), state.unscoped)
        };
        self.set_active(None);
        self.set_unscoped(true);
        debug!("entered unscoped block");
        Restore {
            ctx: self,
            saved: Saved::Unscoped { active, unscoped },
        }
    }

    fn enter_mutable(&self) -> Restore<'_> {
        let saved = self.is_mutable_tenant();
        self.set_mutable_tenant(true);
        debug!("entered mutable tenant block");
        Restore {
            ctx: self,
            saved: Saved::Mutable(saved),
        }
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TenantContext")
            .field("active", &state.active)
            .field("test_override", &state.test_override)
            .field("unscoped", &state.unscoped)
            .field("mutable_tenant", &state.mutable_tenant)
            .finish()
    }
}

enum Saved {
    Active(Option<TenantRef>),
    Unscoped {
        active: Option<TenantRef>,
        unscoped: bool,
    },
    Mutable(bool),
}

/// Restores saved context state when dropped.
struct Restore<'a> {
    ctx: &'a TenantContext,
    saved: Saved,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        match &self.saved {
            Saved::Active(active) => self.ctx.set_active(active.clone()),
            Saved::Unscoped { active, unscoped } => {
                self.ctx.set_unscoped(*unscoped);
                self.ctx.set_active(active.clone());
            }
            Saved::Mutable(mutable) => self.ctx.set_mutable_tenant(*mutable),
        }
    }
}
