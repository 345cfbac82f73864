use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regauth_auth::{Identity, IdentityError, IdentityResolver, Project};
use regauth_core::{ProjectId, ProjectName, Username};

/// In-memory identity provider for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    users: RwLock<Vec<Identity>>,
    projects: RwLock<HashMap<ProjectId, Project>>,
    unavailable: AtomicBool,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: ProjectId, name: ProjectName) {
        match self.projects.write() {
            Ok(mut projects) => {
                projects.insert(id.clone(), Project { id, name });
            }
            Err(_) => dropped_write("add_project"),
        }
    }

    pub fn add_user(&self, username: Username, default_project_id: Option<ProjectId>) {
        match self.users.write() {
            Ok(mut users) => {
                let id = format!("user-{}", users.len() + 1);
                users.push(Identity {
                    id,
                    username,
                    default_project_id,
                });
            }
            Err(_) => dropped_write("add_user"),
        }
    }

    /// Rename a project in place, as an operator would in the provider.
    pub fn rename_project(&self, id: &ProjectId, name: ProjectName) {
        match self.projects.write() {
            Ok(mut projects) => {
                if let Some(project) = projects.get_mut(id) {
                    project.name = name;
                }
            }
            Err(_) => dropped_write("rename_project"),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(IdentityError::unavailable("identity provider marked unavailable"))
        } else {
            Ok(())
        }
    }
}

// Lookups against a poisoned store already fail as unavailable.
fn dropped_write(operation: &'static str) {
    tracing::error!(operation, "identity store lock poisoned; write dropped");
}

#[async_trait::async_trait]
impl IdentityResolver for InMemoryIdentityProvider {
    async fn find_identities(&self, username: &Username) -> Result<Vec<Identity>, IdentityError> {
        self.check()?;
        let users = self
            .users
            .read()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;
        Ok(users.iter().filter(|u| &u.username == username).cloned().collect())
    }

    async fn project(&self, id: &ProjectId) -> Result<Option<Project>, IdentityError> {
        self.check()?;
        let projects = self
            .projects
            .read()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;
        Ok(projects.get(id).cloned())
    }
}
