//! `regauth-core`: value types shared by the authorization core and its adapters.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod action;
pub mod error;
pub mod name;

pub use action::{Action, ActionSet};
pub use error::{DomainError, DomainResult};
pub use name::{ProjectId, ProjectName, RepositoryName, Username};
