use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use regauth_core::Username;

use crate::Role;

/// The caller an authorization request is made for.
///
/// Authentication happens before this object is built; the core trusts the
/// username and roles it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    username: Username,
    roles: Vec<Role>,
}

impl Principal {
    pub fn new(username: Username, roles: Vec<Role>) -> Self {
        Self { username, roles }
    }

    /// Build a principal for a registry account, granting [`Role::ADMIN`] to
    /// the configured administrator accounts.
    pub fn from_account(username: Username, admin_accounts: &BTreeSet<Username>) -> Self {
        let roles = if admin_accounts.contains(&username) {
            vec![Role::ADMIN]
        } else {
            Vec::new()
        };
        Self { username, roles }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Capability check; the engine never compares usernames.
    pub fn is_privileged(&self, policy: &PrivilegePolicy) -> bool {
        policy.is_privileged(self)
    }
}

/// Which roles carry the privileged capability (bypass visibility and
/// ownership checks, act on the registry resource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegePolicy {
    privileged_roles: BTreeSet<Role>,
}

impl PrivilegePolicy {
    pub fn new(privileged_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            privileged_roles: privileged_roles.into_iter().collect(),
        }
    }

    pub fn is_privileged(&self, principal: &Principal) -> bool {
        principal
            .roles()
            .iter()
            .any(|r| self.privileged_roles.contains(r))
    }
}

impl Default for PrivilegePolicy {
    fn default() -> Self {
        Self::new([Role::ADMIN])
    }
}
