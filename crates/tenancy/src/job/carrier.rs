//! Tenant capture and restore.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{TenancyResult, TenantError};
use crate::scope::Predicate;
use crate::tenant::{TenantContext, TenantRef, key_to_string};

use super::TenantLocator;

/// The serialized identity of a tenant: its type name and primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPayload {
    /// Tenant type name.
    pub class: String,
    /// Tenant primary key value.
    pub id: Value,
}

impl TenantPayload {
    /// Builds a payload for a persisted tenant; unsaved tenants have none.
    pub fn from_tenant(tenant: &TenantRef) -> Option<Self> {
        Some(Self {
            class: tenant.type_name().to_string(),
            id: tenant.key()?.clone(),
        })
    }
}

/// Captures the current tenant of a context.
pub fn capture(ctx: &TenantContext) -> Option<TenantPayload> {
    let payload = ctx.current().as_ref().and_then(TenantPayload::from_tenant);
    if let Some(payload) = &payload {
        debug!(tenant_type = %payload.class, tenant_key = %payload.id, "captured tenant for job");
    }
    payload
}

/// Looks the captured tenant up again.
///
/// Fails with [`TenantError::TenantNotFound`] if the locator has no such row.
pub async fn restore<L: TenantLocator + ?Sized>(
    payload: &TenantPayload,
    locator: &L,
    scope: Option<&Predicate>,
) -> TenancyResult<TenantRef> {
    let tenant = locator
        .locate(&payload.class, &payload.id, scope)
        .await?
        .ok_or_else(|| TenantError::TenantNotFound {
            tenant_type: payload.class.clone(),
            key: key_to_string(&payload.id),
        })?;
    debug!(tenant = %tenant, "restored tenant for job");
    Ok(tenant)
}

/// Runs `body` with the captured tenant active.
///
/// The tenant is looked up with the configured job restore scope. Without a
/// payload, `body` runs with no active tenant. Either way the context's
/// previous active tenant is restored when `body` finishes, fails or is
/// dropped.
pub async fn run_with_restored_tenant<L, F>(
    ctx: &TenantContext,
    payload: Option<&TenantPayload>,
    locator: &L,
    body: F,
) -> TenancyResult<F::Output>
where
    L: TenantLocator + ?Sized,
    F: Future,
{
    let tenant = match payload {
        Some(payload) => {
            let scope = ctx.tenancy().config().job_restore_scope.as_ref();
            Some(restore(payload, locator, scope).await?)
        }
        None => None,
    };
    Ok(ctx.with_tenant_async(tenant, body).await)
}
