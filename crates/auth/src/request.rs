//! Authorization requests and decisions.

use core::str::FromStr;

use serde::Serialize;

use regauth_core::{ActionSet, DomainError, RepositoryName};

use crate::{AuthzError, Principal};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// The registry as a whole (e.g. catalog listing).
    Registry,
    /// One repository within the registry.
    Repository,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Registry => "registry",
            ResourceType::Repository => "repository",
        }
    }
}

impl FromStr for ResourceType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(ResourceType::Registry),
            "repository" => Ok(ResourceType::Repository),
            other => Err(AuthzError::UnsupportedResourceType(other.to_string())),
        }
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource an authorization request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Registry-level resource, named by the registry (usually `catalog`).
    Registry(String),
    Repository(RepositoryName),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Registry(_) => ResourceType::Registry,
            Resource::Repository(_) => ResourceType::Repository,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Registry(name) => name,
            Resource::Repository(name) => name.as_str(),
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource_type(), self.name())
    }
}

/// One authorization question: may `principal` perform `requested` on `resource`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub principal: Principal,
    pub resource: Resource,
    pub requested: ActionSet,
}

impl AuthorizationRequest {
    pub fn registry(principal: Principal, name: impl Into<String>, requested: ActionSet) -> Self {
        Self {
            principal,
            resource: Resource::Registry(name.into()),
            requested,
        }
    }

    pub fn repository(principal: Principal, name: RepositoryName, requested: ActionSet) -> Self {
        Self {
            principal,
            resource: Resource::Repository(name),
            requested,
        }
    }

    /// Build a request from untyped parts as they arrive from the transport.
    ///
    /// Unknown resource types fail with [`AuthzError::UnsupportedResourceType`].
    pub fn new(
        principal: Principal,
        resource_type: &str,
        name: &str,
        requested: ActionSet,
    ) -> Result<Self, AuthzError> {
        match resource_type.parse::<ResourceType>()? {
            ResourceType::Registry => {
                if name.trim().is_empty() {
                    return Err(DomainError::validation("registry resource name must not be empty").into());
                }
                Ok(Self::registry(principal, name, requested))
            }
            ResourceType::Repository => {
                let name = RepositoryName::new(name)?;
                Ok(Self::repository(principal, name, requested))
            }
        }
    }

    /// Parse a registry token scope: `type:name:action[,action...]`.
    ///
    /// The first `:` ends the type and the last `:` starts the actions.
    pub fn from_scope(principal: Principal, scope: &str) -> Result<Self, AuthzError> {
        let (resource_type, rest) = scope
            .split_once(':')
            .ok_or_else(|| DomainError::invalid_scope(format!("missing resource type in '{scope}'")))?;
        let (name, actions) = rest
            .rsplit_once(':')
            .ok_or_else(|| DomainError::invalid_scope(format!("missing actions in '{scope}'")))?;

        Self::new(principal, resource_type, name, ActionSet::parse(actions)?)
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource.resource_type()
    }
}

/// Which rule of the decision chain produced a [`Decision`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    RegistryAdmin,
    UnregisteredRepository,
    PrivilegedPrincipal,
    PublicRead,
    PublicWriteDenied,
    ProjectMember,
    NotProjectMember,
}

/// Successful authorization outcome.
///
/// An empty `allowed` set means "evaluated, zero actions granted"; it is not
/// an error. Errors are returned as [`AuthzError`] and always mean deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: ActionSet,
    pub rule: DecisionRule,
}

impl Decision {
    pub fn new(allowed: ActionSet, rule: DecisionRule) -> Self {
        Self { allowed, rule }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
