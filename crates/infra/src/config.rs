//! Process configuration.
//!
//! Everything the gateway needs to reach its collaborators is supplied here at
//! startup; nothing is compiled in.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use regauth_auth::{EngineConfig, PrivilegePolicy, Role};
use regauth_core::Username;

pub const ENV_PREFIX: &str = "REGAUTH_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// A string that must never appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string; may carry credentials.
    pub url: Secret,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct KeystoneConfig {
    /// Base URL of the Keystone v3 API, e.g. `http://keystone:35357/v3`.
    pub url: String,
    pub admin_token: Secret,
    /// Domain users are looked up in.
    pub domain_id: String,
    pub request_timeout_ms: u64,
}

impl KeystoneConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
    /// Accounts that receive the privileged role.
    pub admin_accounts: Vec<Username>,
    /// Zero disables the bound.
    pub decision_timeout_ms: u64,
}

impl AuthzConfig {
    pub fn admin_accounts(&self) -> BTreeSet<Username> {
        self.admin_accounts.iter().cloned().collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            privilege: PrivilegePolicy::new([Role::ADMIN]),
            decision_timeout: (self.decision_timeout_ms > 0)
                .then(|| Duration::from_millis(self.decision_timeout_ms)),
        }
    }
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_accounts: default_admin_accounts(),
            decision_timeout_ms: default_decision_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub keystone: KeystoneConfig,
    pub authz: AuthzConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5001))
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    3_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_decision_timeout_ms() -> u64 {
    10_000
}

fn default_admin_accounts() -> Vec<Username> {
    Username::new("admin").into_iter().collect()
}

impl GatewayConfig {
    /// Load from `REGAUTH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (keys include the `REGAUTH_` prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };

        let database = DatabaseConfig {
            url: Secret::new(vars.required("DATABASE_URL")?),
            max_connections: vars.parsed("DB_MAX_CONNECTIONS")?.unwrap_or_else(default_max_connections),
            acquire_timeout_ms: vars
                .parsed("DB_ACQUIRE_TIMEOUT_MS")?
                .unwrap_or_else(default_acquire_timeout_ms),
        };

        let keystone = KeystoneConfig {
            url: vars.required("KEYSTONE_URL")?,
            admin_token: Secret::new(vars.required("KEYSTONE_ADMIN_TOKEN")?),
            domain_id: vars.required("KEYSTONE_DOMAIN_ID")?,
            request_timeout_ms: vars
                .parsed("KEYSTONE_TIMEOUT_MS")?
                .unwrap_or_else(default_request_timeout_ms),
        };

        let admin_accounts = match vars.get("ADMIN_ACCOUNTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Username::new(s).map_err(|e| ConfigError::Invalid {
                        key: format!("{ENV_PREFIX}ADMIN_ACCOUNTS"),
                        message: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => default_admin_accounts(),
        };

        let authz = AuthzConfig {
            admin_accounts,
            decision_timeout_ms: vars
                .parsed("DECISION_TIMEOUT_MS")?
                .unwrap_or_else(default_decision_timeout_ms),
        };

        let config = Self {
            listen_addr: vars.parsed("LISTEN_ADDR")?.unwrap_or_else(default_listen_addr),
            database,
            keystone,
            authz,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.keystone.url).map_err(|e| ConfigError::Invalid {
            key: format!("{ENV_PREFIX}KEYSTONE_URL"),
            message: e.to_string(),
        })?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: format!("{ENV_PREFIX}DB_MAX_CONNECTIONS"),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}{name}")))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: core::str::FromStr,
        T::Err: core::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: format!("{ENV_PREFIX}{name}"),
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}
