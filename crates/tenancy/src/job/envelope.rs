//! Job envelopes carrying the enqueuing tenant.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::TenancyResult;
use crate::tenant::TenantContext;

use super::carrier::{TenantPayload, capture, run_with_restored_tenant};
use super::TenantLocator;

/// A unit of work together with the tenant that enqueued it.
///
/// # Examples
///
/// ```
/// use helios_tenancy::{Tenancy, TenancyConfig};
/// use helios_tenancy::job::JobEnvelope;
/// use helios_tenancy::store::{MemoryStore, Record, RecordStore};
/// use helios_tenancy::tenant::TenantRef;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.insert(Record::new("Account").with("name", "foo")).unwrap();
///
/// let tenancy = Tenancy::new(TenancyConfig::default());
/// let web = tenancy.context();
/// web.set_active(TenantRef::new("Account", 1));
/// let json = JobEnvelope::enqueue(&web, "send-report").to_json().unwrap();
///
/// let worker = tenancy.context();
/// let job: JobEnvelope<String> = JobEnvelope::from_json(&json).unwrap();
/// let tenant = job
///     .perform(&worker, &store, |_args| async { worker.current() })
///     .await
///     .unwrap();
/// assert_eq!(tenant, Some(TenantRef::new("Account", 1)));
/// assert_eq!(worker.current(), None);
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope<T> {
    /// Unique job identifier.
    pub job_id: Uuid,
    /// The tenant active when the job was enqueued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantPayload>,
    /// Job arguments.
    pub args: T,
}

impl<T> JobEnvelope<T> {
    /// Wraps job arguments, capturing the context's current tenant.
    pub fn enqueue(ctx: &TenantContext, args: T) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            tenant: capture(ctx),
            args,
        }
    }

    /// Runs `handler` with the captured tenant restored on `ctx`.
    pub async fn perform<L, F, Fut>(
        self,
        ctx: &TenantContext,
        locator: &L,
        handler: F,
    ) -> TenancyResult<Fut::Output>
    where
        L: TenantLocator + ?Sized,
        F: FnOnce(T) -> Fut,
        Fut: Future,
    {
        let Self {
            job_id,
            tenant,
            args,
        } = self;
        debug!(%job_id, "performing job");
        run_with_restored_tenant(ctx, tenant.as_ref(), locator, handler(args)).await
    }
}

impl<T: Serialize> JobEnvelope<T> {
    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> TenancyResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> JobEnvelope<T> {
    /// Deserializes an envelope from JSON.
    pub fn from_json(json: &str) -> TenancyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
