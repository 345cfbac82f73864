//! `regauth-auth`: the authorization-decision core of the registry gateway.
//!
//! This crate is intentionally decoupled from HTTP and storage: the identity
//! provider and the repository catalog are consumed through the
//! [`IdentityResolver`] and [`RepositoryCatalog`] contracts.

pub mod authorize;
pub mod catalog;
pub mod identity;
pub mod policy;
pub mod principal;
pub mod request;
pub mod roles;

pub use authorize::{AuthorizationEngine, AuthzError, EngineConfig, ErrorKind, fail_closed};
pub use catalog::{
    CatalogError, ProjectRepositoryRelation, RelationStatus, RepositoryCatalog, RepositoryRecord,
    Visibility,
};
pub use identity::{Identity, IdentityError, IdentityResolver, Project};
pub use policy::{Permitted, RuleOutcome};
pub use principal::{Principal, PrivilegePolicy};
pub use request::{AuthorizationRequest, Decision, DecisionRule, Resource, ResourceType};
pub use roles::Role;
