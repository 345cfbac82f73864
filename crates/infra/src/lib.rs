//! Infrastructure layer: catalog storage, identity provider client, config.

pub mod catalog;
pub mod config;
pub mod identity;


pub use catalog::{InMemoryCatalog, PostgresCatalog};
pub use config::{AuthzConfig, ConfigError, DatabaseConfig, GatewayConfig, KeystoneConfig, Secret};
pub use identity::{InMemoryIdentityProvider, KeystoneClient};
