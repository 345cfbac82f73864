//! Domain error model.

use thiserror::Error;

/// Result type used across the value layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Value-level error.
///
/// Keep this focused on deterministic validation failures. Collaborator and
/// storage failures have their own error types in the crates that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A scope string could not be parsed.
    #[error("invalid scope: {0}")]
    InvalidScope(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_scope(msg: impl Into<String>) -> Self {
        Self::InvalidScope(msg.into())
    }
}
