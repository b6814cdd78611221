use std::collections::BTreeSet;

use crate::Authentication;

/// Group whose members bypass tenant checks by default.
pub const OPERATON_ADMIN: &str = "operaton-admin";

/// Which callers are engine administrators.
///
/// Administrators are exempt from tenant enforcement, independently of the
/// engine-wide switch and of their own tenant memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicy {
    groups: BTreeSet<String>,
    users: BTreeSet<String>,
}

impl AdminPolicy {
    pub fn new<G, U>(groups: G, users: U) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            users: users.into_iter().map(Into::into).collect(),
        }
    }

    /// Nobody is an administrator.
    pub fn none() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new())
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn is_admin(&self, authentication: &Authentication) -> bool {
        self.users.contains(authentication.user_id())
            || authentication
                .group_ids()
                .iter()
                .any(|g| self.groups.contains(g))
    }
}

impl Default for AdminPolicy {
    fn default() -> Self {
        Self::new([OPERATON_ADMIN], Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_recognizes_admin_group() {
        let policy = AdminPolicy::default();
        let admin = Authentication::new("piggy", [OPERATON_ADMIN], Vec::<String>::new());

        assert!(policy.is_admin(&admin));
        assert!(!policy.is_admin(&Authentication::user("kermit")));
    }

    #[test]
    fn admin_users_bypass_without_group() {
        let policy = AdminPolicy::new(Vec::<String>::new(), ["root"]);

        assert!(policy.is_admin(&Authentication::user("root")));
        assert!(!policy.is_admin(&Authentication::new("kermit", [OPERATON_ADMIN], ["tenant1"])));
    }
}
