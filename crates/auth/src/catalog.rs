//! Repository catalog contract.
//!
//! The catalog is the relational source of truth for repository visibility
//! and for which projects own which repositories.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regauth_core::{DomainError, ProjectName, RepositoryName};

/// Catalog-declared exposure level of a registered repository.
///
/// An unregistered repository has no visibility at all; that case is modeled
/// as `None` by [`RepositoryCatalog::visibility`] and denies by default.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl core::fmt::Display for Visibility {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Visibility {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(DomainError::validation(format!(
                "visibility must be 'public' or 'private', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: RepositoryName,
    pub visibility: Visibility,
}

/// Relation status. Unlinking is a logical delete so history is preserved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    Exists,
    NonExistent,
}

impl RelationStatus {
    /// Stored column value.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationStatus::Exists => "exist",
            RelationStatus::NonExistent => "non-exist",
        }
    }
}

impl core::str::FromStr for RelationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exist" => Ok(RelationStatus::Exists),
            "non-exist" => Ok(RelationStatus::NonExistent),
            other => Err(DomainError::validation(format!("unknown relation status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRepositoryRelation {
    pub project: ProjectName,
    pub repository: RepositoryName,
    pub status: RelationStatus,
    pub updated_at: DateTime<Utc>,
}

/// Catalog operation error.
///
/// Every variant means "the catalog could not answer"; the engine surfaces it
/// as `CatalogUnavailable` and never retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    #[error("invalid catalog record: {0}")]
    InvalidRecord(String),
}

impl CatalogError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }
}

/// Relational catalog of repositories and project ownership.
///
/// Implementations must be safe for concurrent use by many decisions. Reads
/// are not atomic with concurrent mutations: a decision racing a
/// register/link/unlink may observe the state before or after it.
#[async_trait::async_trait]
pub trait RepositoryCatalog: Send + Sync {
    /// Look up a repository's record. `Ok(None)` means "not registered".
    async fn visibility(
        &self,
        repository: &RepositoryName,
    ) -> Result<Option<RepositoryRecord>, CatalogError>;

    /// Repositories linked to a project with status [`RelationStatus::Exists`].
    async fn repositories_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<BTreeSet<RepositoryName>, CatalogError>;

    /// Every relation recorded for a project, including unlinked ones.
    async fn relations_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<ProjectRepositoryRelation>, CatalogError>;

    /// Register a repository. Re-registering updates the visibility and leaves
    /// relations untouched.
    async fn register_repository(
        &self,
        repository: &RepositoryName,
        visibility: Visibility,
    ) -> Result<(), CatalogError>;

    /// Create the relation, or revive it, with status [`RelationStatus::Exists`].
    async fn link_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError>;

    /// Mark the relation [`RelationStatus::NonExistent`]. No-op when absent.
    async fn unlink_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError>;
}

#[async_trait::async_trait]
impl<C> RepositoryCatalog for Arc<C>
where
    C: RepositoryCatalog + ?Sized,
{
    async fn visibility(
        &self,
        repository: &RepositoryName,
    ) -> Result<Option<RepositoryRecord>, CatalogError> {
        (**self).visibility(repository).await
    }

    async fn repositories_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<BTreeSet<RepositoryName>, CatalogError> {
        (**self).repositories_for_project(project).await
    }

    async fn relations_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<ProjectRepositoryRelation>, CatalogError> {
        (**self).relations_for_project(project).await
    }

    async fn register_repository(
        &self,
        repository: &RepositoryName,
        visibility: Visibility,
    ) -> Result<(), CatalogError> {
        (**self).register_repository(repository, visibility).await
    }

    async fn link_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        (**self).link_project_repository(project, repository).await
    }

    async fn unlink_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        (**self).unlink_project_repository(project, repository).await
    }
}
