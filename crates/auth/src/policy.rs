//! Decision rules.
//!
//! Each rule returns what it permits as a value; only the engine narrows the
//! requested set, always through [`ActionSet::intersect`]. A rule that wants
//! per-action granularity returns [`Permitted::Only`] without any change to
//! the engine's control flow.

use std::collections::BTreeSet;

use regauth_core::{ActionSet, RepositoryName};

use crate::{AuthzError, DecisionRule, Principal, PrivilegePolicy, Visibility};

/// The action set a rule allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permitted {
    /// Everything that was requested.
    All,
    Nothing,
    Only(ActionSet),
}

impl Permitted {
    /// The concrete permitted set for a given request.
    pub fn resolve(&self, requested: &ActionSet) -> ActionSet {
        match self {
            Permitted::All => requested.clone(),
            Permitted::Nothing => ActionSet::empty(),
            Permitted::Only(set) => set.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: DecisionRule,
    pub permitted: Permitted,
}

impl RuleOutcome {
    pub fn grant(rule: DecisionRule) -> Self {
        Self {
            rule,
            permitted: Permitted::All,
        }
    }

    pub fn deny(rule: DecisionRule) -> Self {
        Self {
            rule,
            permitted: Permitted::Nothing,
        }
    }
}

/// Registry-level resources are reserved to privileged principals.
pub fn registry(principal: &Principal, privilege: &PrivilegePolicy) -> Result<RuleOutcome, AuthzError> {
    if principal.is_privileged(privilege) {
        Ok(RuleOutcome::grant(DecisionRule::RegistryAdmin))
    } else {
        Err(AuthzError::PermissionDenied(format!(
            "only privileged principals may access the registry resource (principal '{}')",
            principal.username()
        )))
    }
}

/// Repositories without a catalog record deny everything.
pub fn unregistered() -> RuleOutcome {
    RuleOutcome::deny(DecisionRule::UnregisteredRepository)
}

pub fn privileged(principal: &Principal, privilege: &PrivilegePolicy) -> Option<RuleOutcome> {
    principal
        .is_privileged(privilege)
        .then(|| RuleOutcome::grant(DecisionRule::PrivilegedPrincipal))
}

/// Public repositories are read-open and write-protected.
pub fn public(visibility: Visibility, requested: &ActionSet) -> Option<RuleOutcome> {
    if visibility != Visibility::Public {
        return None;
    }
    if requested.contains_write() {
        Some(RuleOutcome::deny(DecisionRule::PublicWriteDenied))
    } else {
        Some(RuleOutcome::grant(DecisionRule::PublicRead))
    }
}

/// Private repositories are open to the project that owns them.
pub fn membership(repository: &RepositoryName, owned: &BTreeSet<RepositoryName>) -> RuleOutcome {
    if owned.contains(repository) {
        RuleOutcome::grant(DecisionRule::ProjectMember)
    } else {
        RuleOutcome::deny(DecisionRule::NotProjectMember)
    }
}
