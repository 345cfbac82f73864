use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use regauth_auth::{
    CatalogError, ProjectRepositoryRelation, RelationStatus, RepositoryCatalog, RepositoryRecord,
    Visibility,
};
use regauth_core::{ProjectName, RepositoryName};

/// In-memory catalog for tests/dev.
///
/// `set_unavailable(true)` makes every operation fail the way a lost database
/// connection would.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    repositories: RwLock<HashMap<RepositoryName, Visibility>>,
    relations: RwLock<BTreeMap<(ProjectName, RepositoryName), (RelationStatus, DateTime<Utc>)>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self, operation: &'static str) -> Result<(), CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CatalogError::unavailable(operation, "catalog marked unavailable"))
        } else {
            Ok(())
        }
    }
}

fn poisoned(operation: &'static str) -> CatalogError {
    CatalogError::unavailable(operation, "lock poisoned")
}

#[async_trait::async_trait]
impl RepositoryCatalog for InMemoryCatalog {
    async fn visibility(
        &self,
        repository: &RepositoryName,
    ) -> Result<Option<RepositoryRecord>, CatalogError> {
        self.check("visibility")?;
        let map = self.repositories.read().map_err(|_| poisoned("visibility"))?;
        Ok(map.get(repository).map(|visibility| RepositoryRecord {
            name: repository.clone(),
            visibility: *visibility,
        }))
    }

    async fn repositories_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<BTreeSet<RepositoryName>, CatalogError> {
        self.check("repositories_for_project")?;
        let map = self
            .relations
            .read()
            .map_err(|_| poisoned("repositories_for_project"))?;
        Ok(map
            .iter()
            .filter(|((p, _), (status, _))| p == project && *status == RelationStatus::Exists)
            .map(|((_, r), _)| r.clone())
            .collect())
    }

    async fn relations_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<ProjectRepositoryRelation>, CatalogError> {
        self.check("relations_for_project")?;
        let map = self.relations.read().map_err(|_| poisoned("relations_for_project"))?;
        Ok(map
            .iter()
            .filter(|((p, _), _)| p == project)
            .map(|((p, r), (status, updated_at))| ProjectRepositoryRelation {
                project: p.clone(),
                repository: r.clone(),
                status: *status,
                updated_at: *updated_at,
            })
            .collect())
    }

    async fn register_repository(
        &self,
        repository: &RepositoryName,
        visibility: Visibility,
    ) -> Result<(), CatalogError> {
        self.check("register_repository")?;
        let mut map = self
            .repositories
            .write()
            .map_err(|_| poisoned("register_repository"))?;
        map.insert(repository.clone(), visibility);
        Ok(())
    }

    async fn link_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        self.check("link_project_repository")?;
        let mut map = self
            .relations
            .write()
            .map_err(|_| poisoned("link_project_repository"))?;
        map.insert(
            (project.clone(), repository.clone()),
            (RelationStatus::Exists, Utc::now()),
        );
        Ok(())
    }

    async fn unlink_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        self.check("unlink_project_repository")?;
        let mut map = self
            .relations
            .write()
            .map_err(|_| poisoned("unlink_project_repository"))?;
        if let Some(entry) = map.get_mut(&(project.clone(), repository.clone())) {
            *entry = (RelationStatus::NonExistent, Utc::now());
        }
        Ok(())
    }
}
