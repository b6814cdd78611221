use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tenantgate_core::TenantId;

/// Identity of the caller issuing commands.
///
/// Immutable while installed; replaced wholesale by
/// [`IdentityService::set_authentication`](crate::IdentityService::set_authentication).
/// An empty `tenant_ids` set means "no tenant membership".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    user_id: String,
    group_ids: BTreeSet<String>,
    tenant_ids: BTreeSet<TenantId>,
}

impl Authentication {
    pub fn new<G, T>(user_id: impl Into<String>, group_ids: G, tenant_ids: T) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<TenantId>,
    {
        Self {
            user_id: user_id.into(),
            group_ids: group_ids.into_iter().map(Into::into).collect(),
            tenant_ids: tenant_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// A caller with neither groups nor tenants.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Vec::<String>::new(), Vec::<TenantId>::new())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn group_ids(&self) -> &BTreeSet<String> {
        &self.group_ids
    }

    pub fn tenant_ids(&self) -> &BTreeSet<TenantId> {
        &self.tenant_ids
    }

    pub fn is_member_of_group(&self, group_id: &str) -> bool {
        self.group_ids.contains(group_id)
    }

    pub fn is_member_of_tenant(&self, tenant_id: &TenantId) -> bool {
        self.tenant_ids.contains(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_groups_and_tenants() {
        let auth = Authentication::new("kermit", ["accounting"], ["tenant1", "tenant2"]);

        assert_eq!(auth.user_id(), "kermit");
        assert!(auth.is_member_of_group("accounting"));
        assert!(auth.is_member_of_tenant(&TenantId::new("tenant2")));
        assert!(!auth.is_member_of_tenant(&TenantId::new("tenant3")));
    }

    #[test]
    fn plain_user_has_no_tenant_membership() {
        let auth = Authentication::user("gonzo");
        assert!(auth.tenant_ids().is_empty());
        assert!(auth.group_ids().is_empty());
    }
}
