//! Tenant assignment for entities created without an explicit tenant.

use tenantgate_auth::Authentication;
use tenantgate_core::{EntityId, TenantId};

/// Inputs available when choosing a tenant for a new process instance.
#[derive(Debug, Clone, Copy)]
pub struct TenantIdProviderContext<'a> {
    pub definition_id: &'a EntityId,
    pub definition_key: &'a str,
    pub authentication: Option<&'a Authentication>,
}

/// Chooses a tenant for an instance of a shared definition.
///
/// Only consulted when the definition has no tenant; instances of a tenant's
/// definition always inherit that tenant.
pub trait TenantIdProvider: Send + Sync {
    fn provide_tenant_id(&self, ctx: &TenantIdProviderContext<'_>) -> Option<TenantId>;
}

impl<F> TenantIdProvider for F
where
    F: Fn(&TenantIdProviderContext<'_>) -> Option<TenantId> + Send + Sync,
{
    fn provide_tenant_id(&self, ctx: &TenantIdProviderContext<'_>) -> Option<TenantId> {
        self(ctx)
    }
}
