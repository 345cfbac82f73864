use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use regauth_core::{ActionSet, DomainError, RepositoryName};

use crate::policy::{self, RuleOutcome};
use crate::{
    AuthorizationRequest, CatalogError, Decision, IdentityError, IdentityResolver, Principal,
    PrivilegePolicy, RepositoryCatalog, Resource,
};

/// Authorization failure.
///
/// Any error means "deny everything that was requested". Use [`fail_closed`]
/// when only the allowed set matters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unsupported resource type '{0}'")]
    UnsupportedResourceType(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    #[error("identity resolution failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("repository catalog failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("decision timed out after {0:?}")]
    TimedOut(Duration),
}

/// Programmatic error classification (never match on messages).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedResourceType,
    PermissionDenied,
    InvalidRequest,
    IdentityNotFound,
    ProjectNotFound,
    IdentityProviderUnavailable,
    CatalogUnavailable,
    TimedOut,
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::UnsupportedResourceType(_) => ErrorKind::UnsupportedResourceType,
            AuthzError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AuthzError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AuthzError::Identity(IdentityError::NotFound(_)) => ErrorKind::IdentityNotFound,
            AuthzError::Identity(IdentityError::NoDefaultProject(_))
            | AuthzError::Identity(IdentityError::ProjectNotFound(_)) => ErrorKind::ProjectNotFound,
            AuthzError::Identity(IdentityError::Unavailable(_)) => {
                ErrorKind::IdentityProviderUnavailable
            }
            AuthzError::Catalog(_) => ErrorKind::CatalogUnavailable,
            AuthzError::TimedOut(_) => ErrorKind::TimedOut,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::IdentityProviderUnavailable | ErrorKind::CatalogUnavailable | ErrorKind::TimedOut
        )
    }
}

/// The allowed set of a decision, or nothing on error.
pub fn fail_closed(result: &Result<Decision, AuthzError>) -> ActionSet {
    match result {
        Ok(decision) => decision.allowed.clone(),
        Err(_) => ActionSet::empty(),
    }
}

/// Engine configuration, supplied by the process at construction time.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub privilege: PrivilegePolicy,
    /// Upper bound for one decision including every external call.
    pub decision_timeout: Option<Duration>,
}

/// Authorization decision entry point.
///
/// Holds long-lived, shareable collaborator clients and no mutable state, so
/// one engine (typically behind an `Arc`) serves concurrent requests.
pub struct AuthorizationEngine<C, I> {
    catalog: C,
    identity: I,
    config: EngineConfig,
}

impl<C, I> AuthorizationEngine<C, I>
where
    C: RepositoryCatalog,
    I: IdentityResolver,
{
    pub fn new(catalog: C, identity: I, config: EngineConfig) -> Self {
        Self {
            catalog,
            identity,
            config,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// Decide which of the requested actions the principal may perform.
    ///
    /// The returned allowed set is always a subset of `request.requested`.
    /// Collaborator failures are returned as errors, never defaulted.
    #[instrument(
        skip_all,
        fields(
            principal = %request.principal.username(),
            resource = %request.resource,
            requested = %request.requested
        )
    )]
    pub async fn authorize(&self, request: &AuthorizationRequest) -> Result<Decision, AuthzError> {
        let result = match self.config.decision_timeout {
            Some(limit) => tokio::time::timeout(limit, self.decide(request))
                .await
                .unwrap_or(Err(AuthzError::TimedOut(limit))),
            None => self.decide(request).await,
        };

        match &result {
            Ok(decision) if decision.is_empty() => {
                tracing::info!(rule = ?decision.rule, "authorization denied");
            }
            Ok(decision) => {
                tracing::debug!(rule = ?decision.rule, allowed = %decision.allowed, "authorization granted");
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = ?err.kind(), "authorization failed");
            }
        }

        result
    }

    /// Parse a token scope and authorize it.
    pub async fn authorize_scope(
        &self,
        principal: Principal,
        scope: &str,
    ) -> Result<Decision, AuthzError> {
        let request = AuthorizationRequest::from_scope(principal, scope)?;
        self.authorize(&request).await
    }

    async fn decide(&self, request: &AuthorizationRequest) -> Result<Decision, AuthzError> {
        let outcome = match &request.resource {
            Resource::Registry(_) => policy::registry(&request.principal, &self.config.privilege)?,
            Resource::Repository(name) => self.repository_outcome(request, name).await?,
        };

        let permitted = outcome.permitted.resolve(&request.requested);
        let allowed = request.requested.intersect(&permitted);
        debug_assert!(allowed.is_subset(&request.requested));
        Ok(Decision::new(allowed, outcome.rule))
    }

    async fn repository_outcome(
        &self,
        request: &AuthorizationRequest,
        repository: &RepositoryName,
    ) -> Result<RuleOutcome, AuthzError> {
        let Some(record) = self.catalog.visibility(repository).await? else {
            tracing::debug!(repository = %repository, "repository has no catalog record");
            return Ok(policy::unregistered());
        };

        if let Some(outcome) = policy::privileged(&request.principal, &self.config.privilege) {
            return Ok(outcome);
        }

        if let Some(outcome) = policy::public(record.visibility, &request.requested) {
            return Ok(outcome);
        }

        let project = self
            .identity
            .resolve_default_project(request.principal.username())
            .await?;
        let owned = self.catalog.repositories_for_project(&project.name).await?;
        tracing::debug!(project = %project.name, owned = owned.len(), "resolved owning project");

        Ok(policy::membership(repository, &owned))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use regauth_core::{ProjectId, ProjectName, Username};

    use super::*;
    use crate::{
        DecisionRule, Identity, Project, ProjectRepositoryRelation, RepositoryRecord, Role, Visibility,
    };

    #[derive(Default)]
    struct FakeCatalog {
        records: BTreeMap<String, Visibility>,
        owned: BTreeMap<String, BTreeSet<RepositoryName>>,
        fail_visibility: bool,
        fail_membership: bool,
        slow: bool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RepositoryCatalog for FakeCatalog {
        async fn visibility(
            &self,
            repository: &RepositoryName,
        ) -> Result<Option<RepositoryRecord>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_visibility {
                return Err(CatalogError::unavailable("visibility", "connection refused"));
            }
            Ok(self.records.get(repository.as_str()).map(|v| RepositoryRecord {
                name: repository.clone(),
                visibility: *v,
            }))
        }

        async fn repositories_for_project(
            &self,
            project: &ProjectName,
        ) -> Result<BTreeSet<RepositoryName>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_membership {
                return Err(CatalogError::unavailable("repositories_for_project", "connection reset"));
            }
            Ok(self.owned.get(project.as_str()).cloned().unwrap_or_default())
        }

        async fn relations_for_project(
            &self,
            _project: &ProjectName,
        ) -> Result<Vec<ProjectRepositoryRelation>, CatalogError> {
            Ok(vec![])
        }

        async fn register_repository(
            &self,
            _repository: &RepositoryName,
            _visibility: Visibility,
        ) -> Result<(), CatalogError> {
            Ok(())
        }

        async fn link_project_repository(
            &self,
            _project: &ProjectName,
            _repository: &RepositoryName,
        ) -> Result<(), CatalogError> {
            Ok(())
        }

        async fn unlink_project_repository(
            &self,
            _project: &ProjectName,
            _repository: &RepositoryName,
        ) -> Result<(), CatalogError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeIdentity {
        users: BTreeMap<String, (String, String)>,
        deleted_projects: BTreeSet<String>,
        down: bool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IdentityResolver for FakeIdentity {
        async fn find_identities(&self, username: &Username) -> Result<Vec<Identity>, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down {
                return Err(IdentityError::unavailable("connect timeout"));
            }
            Ok(self
                .users
                .get(username.as_str())
                .map(|(id, _)| Identity {
                    id: format!("uid-{username}"),
                    username: username.clone(),
                    default_project_id: Some(id.parse().unwrap()),
                })
                .into_iter()
                .collect())
        }

        async fn project(&self, id: &ProjectId) -> Result<Option<Project>, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.deleted_projects.contains(id.as_str()) {
                return Ok(None);
            }
            Ok(self.users.values().find(|(pid, _)| pid == id.as_str()).map(|(pid, name)| Project {
                id: pid.parse().unwrap(),
                name: name.parse().unwrap(),
            }))
        }
    }

    fn set(items: &[&str]) -> ActionSet {
        items.iter().copied().collect()
    }

    fn repo(name: &str) -> RepositoryName {
        name.parse().unwrap()
    }

    fn user(name: &str) -> Principal {
        Principal::new(name.parse().unwrap(), vec![])
    }

    fn admin() -> Principal {
        Principal::new("admin".parse().unwrap(), vec![Role::ADMIN])
    }

    fn fixture() -> (FakeCatalog, FakeIdentity) {
        let mut catalog = FakeCatalog::default();
        catalog.records.insert("library/nginx".into(), Visibility::Public);
        catalog.records.insert("team-a/api".into(), Visibility::Private);
        catalog.records.insert("team-b/db".into(), Visibility::Private);
        catalog
            .owned
            .insert("team-a".into(), [repo("team-a/api")].into_iter().collect());

        let mut identity = FakeIdentity::default();
        identity
            .users
            .insert("alice".into(), ("p-a".into(), "team-a".into()));
        (catalog, identity)
    }

    fn engine(catalog: FakeCatalog, identity: FakeIdentity) -> AuthorizationEngine<FakeCatalog, FakeIdentity> {
        AuthorizationEngine::new(catalog, identity, EngineConfig::default())
    }

    async fn decide(principal: Principal, repository: &str, actions: &[&str]) -> Result<Decision, AuthzError> {
        let (catalog, identity) = fixture();
        engine(catalog, identity)
            .authorize(&AuthorizationRequest::repository(principal, repo(repository), set(actions)))
            .await
    }

    #[tokio::test]
    async fn registry_is_admin_only() {
        let (catalog, identity) = fixture();
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::registry(admin(), "catalog", set(&["*"]));
        let decision = engine.authorize(&req).await.unwrap();
        assert_eq!(decision.allowed, set(&["*"]));
        assert_eq!(decision.rule, DecisionRule::RegistryAdmin);

        let req = AuthorizationRequest::registry(user("alice"), "catalog", set(&["*"]));
        let result = engine.authorize(&req).await;
        assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::PermissionDenied);
        assert!(fail_closed(&result).is_empty());
    }

    #[tokio::test]
    async fn unregistered_repository_is_empty_success() {
        let decision = decide(user("alice"), "nobody/knows", &["pull"]).await.unwrap();
        assert!(decision.is_empty());
        assert_eq!(decision.rule, DecisionRule::UnregisteredRepository);

        // Even a privileged principal gets nothing on an unregistered repository.
        let decision = decide(admin(), "nobody/knows", &["pull", "push"]).await.unwrap();
        assert!(decision.is_empty());
    }

    #[tokio::test]
    async fn privileged_principal_bypasses_visibility_and_ownership() {
        let decision = decide(admin(), "team-b/db", &["pull", "push"]).await.unwrap();
        assert_eq!(decision.allowed, set(&["pull", "push"]));
        assert_eq!(decision.rule, DecisionRule::PrivilegedPrincipal);

        let decision = decide(admin(), "library/nginx", &["push"]).await.unwrap();
        assert_eq!(decision.allowed, set(&["push"]));
    }

    #[tokio::test]
    async fn public_repositories_are_read_only() {
        let decision = decide(user("bob"), "library/nginx", &["pull", "push"]).await.unwrap();
        assert!(decision.is_empty());
        assert_eq!(decision.rule, DecisionRule::PublicWriteDenied);

        let decision = decide(user("bob"), "library/nginx", &["pull"]).await.unwrap();
        assert_eq!(decision.allowed, set(&["pull"]));
        assert_eq!(decision.rule, DecisionRule::PublicRead);

        let decision = decide(user("bob"), "library/nginx", &["*"]).await.unwrap();
        assert!(decision.is_empty());
    }

    #[tokio::test]
    async fn private_repositories_follow_project_ownership() {
        let decision = decide(user("alice"), "team-a/api", &["pull", "push"]).await.unwrap();
        assert_eq!(decision.allowed, set(&["pull", "push"]));
        assert_eq!(decision.rule, DecisionRule::ProjectMember);

        let decision = decide(user("alice"), "team-b/db", &["pull"]).await.unwrap();
        assert!(decision.is_empty());
        assert_eq!(decision.rule, DecisionRule::NotProjectMember);
    }

    #[tokio::test]
    async fn unknown_user_on_private_repository_is_an_error() {
        let err = decide(user("mallory"), "team-a/api", &["pull"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityNotFound);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn identity_provider_outage_fails_closed() {
        let (catalog, mut identity) = fixture();
        identity.down = true;
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::repository(user("alice"), repo("team-a/api"), set(&["pull"]));
        let result = engine.authorize(&req).await;

        let err = result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityProviderUnavailable);
        assert!(err.is_retryable());
        assert!(fail_closed(&result).is_empty());
    }

    #[tokio::test]
    async fn catalog_outage_fails_closed_even_for_admin() {
        let (mut catalog, identity) = fixture();
        catalog.fail_visibility = true;
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::repository(admin(), repo("library/nginx"), set(&["pull"]));
        let err = engine.authorize(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogUnavailable);
    }

    #[tokio::test]
    async fn membership_lookup_failure_fails_closed() {
        let (mut catalog, identity) = fixture();
        catalog.fail_membership = true;
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::repository(user("alice"), repo("team-a/api"), set(&["pull", "push"]));
        let result = engine.authorize(&req).await;

        let err = result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogUnavailable);
        assert!(err.is_retryable());
        assert!(fail_closed(&result).is_empty());

        // Public repositories never reach the membership query.
        let req = AuthorizationRequest::repository(user("alice"), repo("library/nginx"), set(&["pull"]));
        assert_eq!(engine.authorize(&req).await.unwrap().allowed, set(&["pull"]));
    }

    #[tokio::test]
    async fn dangling_default_project_is_an_error() {
        let (catalog, mut identity) = fixture();
        identity
            .users
            .insert("drifter".into(), ("p-gone".into(), "gone".into()));
        identity.deleted_projects.insert("p-gone".into());
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::repository(user("drifter"), repo("team-a/api"), set(&["pull"]));
        let result = engine.authorize(&req).await;

        let err = result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProjectNotFound);
        assert!(!err.is_retryable());
        assert!(fail_closed(&result).is_empty());
        assert_eq!(engine.catalog().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn call_chain_length_depends_on_branch() {
        let (catalog, identity) = fixture();
        let engine = engine(catalog, identity);

        let req = AuthorizationRequest::repository(user("bob"), repo("library/nginx"), set(&["pull"]));
        engine.authorize(&req).await.unwrap();
        assert_eq!(engine.catalog().calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.identity().calls.load(Ordering::SeqCst), 0);

        let req = AuthorizationRequest::repository(user("alice"), repo("team-a/api"), set(&["pull"]));
        engine.authorize(&req).await.unwrap();
        assert_eq!(engine.catalog().calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.identity().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_collaborators_time_out() {
        let (mut catalog, identity) = fixture();
        catalog.slow = true;
        let engine = AuthorizationEngine::new(
            catalog,
            identity,
            EngineConfig {
                decision_timeout: Some(Duration::from_millis(250)),
                ..EngineConfig::default()
            },
        );

        let req = AuthorizationRequest::repository(user("alice"), repo("team-a/api"), set(&["pull"]));
        let err = engine.authorize(&req).await.unwrap_err();
        assert_eq!(err, AuthzError::TimedOut(Duration::from_millis(250)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn allowed_is_always_a_subset_of_requested() {
        let (catalog, identity) = fixture();
        let engine = engine(catalog, identity);

        let principals = [admin(), user("alice"), user("bob")];
        let repos = ["library/nginx", "team-a/api", "team-b/db", "nobody/knows"];
        let action_sets: [&[&str]; 5] = [&["pull"], &["push"], &["pull", "push"], &["*"], &[]];

        for principal in &principals {
            for name in repos {
                for actions in action_sets {
                    let requested = set(actions);
                    let req = AuthorizationRequest::repository(principal.clone(), repo(name), requested.clone());
                    if let Ok(decision) = engine.authorize(&req).await {
                        assert!(decision.allowed.is_subset(&requested), "{principal:?} {name} {actions:?}");
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn scope_entry_point_rejects_unknown_types() {
        let (catalog, identity) = fixture();
        let engine = engine(catalog, identity);

        let err = engine.authorize_scope(admin(), "plugin:foo:pull").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedResourceType);
        assert_eq!(engine.catalog().calls.load(Ordering::SeqCst), 0);

        let decision = engine
            .authorize_scope(user("alice"), "repository:team-a/api:pull,push")
            .await
            .unwrap();
        assert_eq!(decision.allowed, set(&["pull", "push"]));
    }
}
