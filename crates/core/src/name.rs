//! Strongly-typed names used across the authorization boundary.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Name of a principal as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

/// Opaque project identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

/// Project name. This is the join key into the catalog's relation table.
///
/// Names are mutable in the identity provider, so a rename orphans every
/// catalog relation recorded under the old name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

/// Repository path within the registry (e.g. `library/nginx`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(String);

fn validate_opaque(kind: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{kind} must not be empty")));
    }
    if value.chars().any(char::is_control) {
        return Err(DomainError::validation(format!(
            "{kind} must not contain control characters"
        )));
    }
    Ok(())
}

/// Registry path grammar: `/`-separated components of lowercase alphanumerics,
/// joined inside a component by `.`, `_`, `__` or runs of `-`.
fn validate_repository(value: &str) -> DomainResult<()> {
    validate_opaque("repository name", value)?;

    for component in value.split('/') {
        let bytes = component.as_bytes();
        let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
            return Err(DomainError::validation(format!(
                "repository name '{value}' has an empty path component"
            )));
        };
        let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        if !alnum(first) || !alnum(last) {
            return Err(DomainError::validation(format!(
                "repository path component '{component}' must start and end with [a-z0-9]"
            )));
        }

        let mut separator = String::new();
        for &b in bytes {
            if alnum(&b) {
                let ok = separator.is_empty()
                    || separator == "."
                    || separator == "_"
                    || separator == "__"
                    || separator.bytes().all(|s| s == b'-');
                if !ok {
                    return Err(DomainError::validation(format!(
                        "repository path component '{component}' has invalid separator '{separator}'"
                    )));
                }
                separator.clear();
            } else if matches!(b, b'.' | b'_' | b'-') {
                separator.push(b as char);
            } else {
                return Err(DomainError::validation(format!(
                    "repository path component '{component}' contains invalid character '{}'",
                    b as char
                )));
            }
        }
    }
    Ok(())
}

macro_rules! impl_name_newtype {
    ($t:ident, $validate:expr) => {
        impl $t {
            /// Validate and wrap a name.
            pub fn new(value: impl Into<String>) -> DomainResult<Self> {
                let value = value.into();
                $validate(value.as_str())?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_name_newtype!(Username, |v: &str| validate_opaque("username", v));
impl_name_newtype!(ProjectId, |v: &str| validate_opaque("project id", v));
impl_name_newtype!(ProjectName, |v: &str| validate_opaque("project name", v));
impl_name_newtype!(RepositoryName, validate_repository);
