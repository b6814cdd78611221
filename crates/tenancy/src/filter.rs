//! Query Tenant Filter for list, report and selection operations.
//!
//! Denial on this path is silent: unauthorized entities are absent from the
//! result. Explicit tenant modifiers are intersected with the authorized set,
//! never used to widen it.

use std::collections::BTreeSet;

use tenantgate_core::{EngineError, EngineResult, TenantId, TenantOwned};
use tracing::debug;

use crate::manager::{AuthorizedTenants, TenantManager};

/// Explicit tenant modifiers supplied by the caller of a list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSelection {
    tenant_ids: Option<BTreeSet<TenantId>>,
    without_tenant_id: bool,
    include_without_tenant_id: bool,
}

impl TenantSelection {
    /// No explicit modifier.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to entities of the given tenants. An empty list is rejected.
    pub fn tenant_id_in<I>(mut self, tenant_ids: I) -> EngineResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<TenantId>,
    {
        let ids: BTreeSet<TenantId> = tenant_ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(EngineError::validation("tenantIdIn requires at least one tenant id"));
        }
        self.tenant_ids = Some(ids);
        self.without_tenant_id = false;
        Ok(self)
    }

    /// Restrict to shared entities.
    pub fn without_tenant_id(mut self) -> Self {
        self.tenant_ids = None;
        self.without_tenant_id = true;
        self
    }

    /// Widen a `tenant_id_in` restriction to shared entities as well.
    pub fn include_without_tenant_id(mut self) -> Self {
        self.include_without_tenant_id = true;
        self
    }

    pub fn tenant_ids(&self) -> Option<&BTreeSet<TenantId>> {
        self.tenant_ids.as_ref()
    }

    pub fn is_without_tenant_id(&self) -> bool {
        self.without_tenant_id
    }

    pub fn matches(&self, tenant_id: Option<&TenantId>) -> bool {
        if self.without_tenant_id {
            return tenant_id.is_none();
        }
        match (&self.tenant_ids, tenant_id) {
            (None, _) => true,
            (Some(ids), Some(t)) => ids.contains(t),
            (Some(_), None) => self.include_without_tenant_id,
        }
    }
}

/// Tenant predicate handed to repositories when building list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPredicate {
    authorized: AuthorizedTenants,
    selection: TenantSelection,
}

impl TenantPredicate {
    pub fn new(authorized: AuthorizedTenants, selection: TenantSelection) -> Self {
        Self {
            authorized,
            selection,
        }
    }

    /// Matches everything (trusted internal paths).
    pub fn unrestricted() -> Self {
        Self::new(AuthorizedTenants::All, TenantSelection::any())
    }

    pub fn authorized(&self) -> &AuthorizedTenants {
        &self.authorized
    }

    pub fn selection(&self) -> &TenantSelection {
        &self.selection
    }

    pub fn matches(&self, tenant_id: Option<&TenantId>) -> bool {
        self.authorized.permits(tenant_id) && self.selection.matches(tenant_id)
    }
}

/// Capability to narrow a collection to what the caller may see.
pub trait CollectionFilter {
    fn predicate(&self, selection: &TenantSelection) -> TenantPredicate;

    fn filter<E>(&self, items: Vec<E>, selection: &TenantSelection) -> Vec<E>
    where
        E: TenantOwned,
        Self: Sized,
    {
        let predicate = self.predicate(selection);
        items
            .into_iter()
            .filter(|e| predicate.matches(e.tenant_id()))
            .collect()
    }
}

/// [`CollectionFilter`] backed by the command's [`TenantManager`].
#[derive(Debug, Clone, Copy)]
pub struct TenantQueryFilter<'a> {
    manager: TenantManager<'a>,
}

impl<'a> TenantQueryFilter<'a> {
    pub fn new(manager: TenantManager<'a>) -> Self {
        Self { manager }
    }
}

impl CollectionFilter for TenantQueryFilter<'_> {
    fn predicate(&self, selection: &TenantSelection) -> TenantPredicate {
        let authorized = self.manager.authorized_tenant_ids();
        match &authorized {
            AuthorizedTenants::All => debug!("tenant filter: unrestricted"),
            AuthorizedTenants::Only(ids) => debug!(tenants = ?ids, "tenant filter: restricted"),
        }
        TenantPredicate::new(authorized, selection.clone())
    }
}
