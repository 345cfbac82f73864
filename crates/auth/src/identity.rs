//! Identity provider contract.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regauth_core::{ProjectId, ProjectName, Username};

/// A user record as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: Username,
    pub default_project_id: Option<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: ProjectName,
}

/// Identity resolution error.
///
/// Provider-specific failures (transport, status codes, payload shape) all
/// collapse into [`IdentityError::Unavailable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no identity found for user '{0}'")]
    NotFound(Username),

    #[error("user '{0}' has no default project")]
    NoDefaultProject(Username),

    #[error("project '{0}' not found")]
    ProjectNotFound(ProjectId),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Resolves usernames to the project that owns their repositories.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Identity records whose name matches `username`.
    async fn find_identities(&self, username: &Username) -> Result<Vec<Identity>, IdentityError>;

    /// Look up a project by id. `Ok(None)` means the provider has no such project.
    async fn project(&self, id: &ProjectId) -> Result<Option<Project>, IdentityError>;

    /// Two-hop lookup: username → default project id → project.
    ///
    /// Only records whose name matches `username` exactly count. When several
    /// do, the first one wins.
    async fn resolve_default_project(&self, username: &Username) -> Result<Project, IdentityError> {
        let identities = self.find_identities(username).await?;
        let identity = select_identity(username, identities)?;

        let project_id = identity
            .default_project_id
            .ok_or_else(|| IdentityError::NoDefaultProject(username.clone()))?;

        self.project(&project_id)
            .await?
            .ok_or(IdentityError::ProjectNotFound(project_id))
    }
}

fn select_identity(username: &Username, identities: Vec<Identity>) -> Result<Identity, IdentityError> {
    let mut exact: Vec<Identity> = identities
        .into_iter()
        .filter(|i| &i.username == username)
        .collect();

    if exact.is_empty() {
        return Err(IdentityError::NotFound(username.clone()));
    }

    let chosen = exact.swap_remove(0);
    if !exact.is_empty() {
        tracing::warn!(
            username = %username,
            matches = exact.len() + 1,
            chosen = %chosen.id,
            "identity lookup returned multiple users; using {}",
            chosen.id
        );
    }

    Ok(chosen)
}

#[async_trait::async_trait]
impl<R> IdentityResolver for Arc<R>
where
    R: IdentityResolver + ?Sized,
{
    async fn find_identities(&self, username: &Username) -> Result<Vec<Identity>, IdentityError> {
        (**self).find_identities(username).await
    }

    async fn project(&self, id: &ProjectId) -> Result<Option<Project>, IdentityError> {
        (**self).project(id).await
    }

    async fn resolve_default_project(&self, username: &Username) -> Result<Project, IdentityError> {
        (**self).resolve_default_project(username).await
    }
}
