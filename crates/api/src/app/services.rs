use std::sync::Arc;

use anyhow::Context;

use regauth_auth::{AuthorizationEngine, IdentityResolver, RepositoryCatalog};
use regauth_infra::{
    AuthzConfig, GatewayConfig, InMemoryCatalog, InMemoryIdentityProvider, KeystoneClient,
    PostgresCatalog,
};

use crate::context::AccountContext;

pub type SharedCatalog = Arc<dyn RepositoryCatalog>;
pub type SharedIdentity = Arc<dyn IdentityResolver>;
pub type Engine = AuthorizationEngine<SharedCatalog, SharedIdentity>;

/// Long-lived services shared by every request.
pub struct AppServices {
    engine: Engine,
    accounts: AccountContext,
}

impl AppServices {
    pub fn new(catalog: SharedCatalog, identity: SharedIdentity, authz: &AuthzConfig) -> Self {
        Self {
            engine: AuthorizationEngine::new(catalog, identity, authz.engine_config()),
            accounts: AccountContext::new(authz.admin_accounts()),
        }
    }

    /// Postgres catalog + Keystone identity provider.
    pub async fn connect(config: &GatewayConfig) -> anyhow::Result<Self> {
        let catalog = PostgresCatalog::connect(&config.database)
            .await
            .context("connecting to the repository catalog")?;
        let identity =
            KeystoneClient::new(&config.keystone).context("building the keystone client")?;

        Ok(Self::new(Arc::new(catalog), Arc::new(identity), &config.authz))
    }

    /// In-memory wiring (dev/test). The returned handles seed and mutate state.
    pub fn in_memory(
        authz: &AuthzConfig,
    ) -> (Self, Arc<InMemoryCatalog>, Arc<InMemoryIdentityProvider>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let services = Self::new(catalog.clone(), identity.clone(), authz);
        (services, catalog, identity)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn catalog(&self) -> &dyn RepositoryCatalog {
        self.engine.catalog().as_ref()
    }

    pub fn accounts(&self) -> &AccountContext {
        &self.accounts
    }
}
