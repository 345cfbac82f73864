use std::collections::BTreeSet;

use regauth_auth::Principal;
use regauth_core::Username;

/// Maps authenticated account names to principals.
///
/// Accounts listed as administrators receive the privileged role; everyone
/// else is an ordinary user with no roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountContext {
    admin_accounts: BTreeSet<Username>,
}

impl AccountContext {
    pub fn new(admin_accounts: BTreeSet<Username>) -> Self {
        Self { admin_accounts }
    }

    pub fn principal(&self, account: Username) -> Principal {
        Principal::from_account(account, &self.admin_accounts)
    }
}
