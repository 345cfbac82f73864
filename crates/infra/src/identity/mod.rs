//! Identity provider adapters.

pub mod in_memory;
pub mod keystone;

pub use in_memory::InMemoryIdentityProvider;
pub use keystone::KeystoneClient;
