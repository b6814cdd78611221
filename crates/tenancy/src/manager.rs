//! Tenant Manager: whether enforcement is active and which tenants pass.

use std::collections::BTreeSet;

use tenantgate_auth::{AdminPolicy, Authentication};
use tenantgate_core::TenantId;

use crate::filter::TenantQueryFilter;
use crate::guard::TenantCommandChecker;
use crate::switch::{EnforcementSwitch, TenantCheckToggle};

/// Tenants the current caller may access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizedTenants {
    /// Enforcement is off; no filtering needed.
    All,
    /// Only these tenants (plus shared entities). May be empty.
    Only(BTreeSet<TenantId>),
}

impl AuthorizedTenants {
    /// Whether an entity owned by `tenant_id` is visible.
    pub fn permits(&self, tenant_id: Option<&TenantId>) -> bool {
        match (self, tenant_id) {
            (AuthorizedTenants::All, _) => true,
            (AuthorizedTenants::Only(_), None) => true,
            (AuthorizedTenants::Only(ids), Some(t)) => ids.contains(t),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, AuthorizedTenants::All)
    }
}

/// Stateless evaluator over the enforcement inputs of one command.
///
/// Holds only borrowed handles; every query re-reads the engine-wide switch
/// and the command's toggle, so no decision is cached across calls.
#[derive(Debug, Clone, Copy)]
pub struct TenantManager<'a> {
    switch: &'a EnforcementSwitch,
    toggle: &'a TenantCheckToggle,
    authentication: Option<&'a Authentication>,
    admins: &'a AdminPolicy,
}

impl<'a> TenantManager<'a> {
    pub fn new(
        switch: &'a EnforcementSwitch,
        toggle: &'a TenantCheckToggle,
        authentication: Option<&'a Authentication>,
        admins: &'a AdminPolicy,
    ) -> Self {
        Self {
            switch,
            toggle,
            authentication,
            admins,
        }
    }

    pub fn authentication(&self) -> Option<&'a Authentication> {
        self.authentication
    }

    /// `switch AND local toggle AND authenticated AND NOT admin`.
    ///
    /// A command cannot re-enable what the engine-wide switch turned off.
    pub fn is_check_enabled(&self) -> bool {
        if !self.switch.is_enabled() || !self.toggle.is_enabled() {
            return false;
        }
        match self.authentication {
            None => false,
            Some(auth) => !self.admins.is_admin(auth),
        }
    }

    /// Whether an entity owned by `tenant_id` may be touched.
    pub fn is_authorized_tenant(&self, tenant_id: Option<&TenantId>) -> bool {
        if !self.is_check_enabled() {
            return true;
        }
        match tenant_id {
            None => true,
            Some(t) => self
                .authentication
                .is_some_and(|auth| auth.is_member_of_tenant(t)),
        }
    }

    pub fn authorized_tenant_ids(&self) -> AuthorizedTenants {
        if !self.is_check_enabled() {
            return AuthorizedTenants::All;
        }
        let ids = self
            .authentication
            .map(|auth| auth.tenant_ids().clone())
            .unwrap_or_default();
        AuthorizedTenants::Only(ids)
    }

    pub fn command_checker(&self) -> TenantCommandChecker<'a> {
        TenantCommandChecker::new(*self)
    }

    pub fn query_filter(&self) -> TenantQueryFilter<'a> {
        TenantQueryFilter::new(*self)
    }
}
