//! Carrying the current tenant across job and queue boundaries.
//!
//! When work is enqueued, [`capture`] records the current tenant as a
//! [`TenantPayload`]. When the work runs, possibly on another worker, the
//! tenant is looked up again through a [`TenantLocator`] and the work runs
//! inside [`TenantContext::with_tenant_async`](crate::TenantContext::with_tenant_async).
//! [`JobEnvelope`] bundles both halves around a job's arguments.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "job_id": "5f0c...",
//!   "tenant": {"class": "Account", "id": 1},
//!   "args": {"report": "monthly"}
//! }
//! ```

mod carrier;
mod envelope;

pub use carrier::{TenantPayload, capture, restore, run_with_restored_tenant};
pub use envelope::JobEnvelope;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TenancyResult;
use crate::scope::Predicate;
use crate::tenant::TenantRef;

/// Looks tenants up by type and primary key when a job is restored.
///
/// The lookup must not apply the tenant type's own default scope, since no
/// tenant is active yet. `scope`, when given, is the only filter applied.
#[async_trait]
pub trait TenantLocator: Send + Sync {
    /// Finds a tenant row, returning `None` if it does not exist.
    async fn locate(
        &self,
        tenant_type: &str,
        key: &Value,
        scope: Option<&Predicate>,
    ) -> TenancyResult<Option<TenantRef>>;
}
