//! Registry actions and the action-set algebra.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Action identifier (e.g. "pull", "push").
///
/// Actions are modeled as opaque strings so new registry verbs do not require
/// a code change. The wildcard `"*"` is the registry's "every action" verb.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const PULL: Action = Action(Cow::Borrowed("pull"));
    pub const PUSH: Action = Action(Cow::Borrowed("push"));
    pub const DELETE: Action = Action(Cow::Borrowed("delete"));
    pub const WILDCARD: Action = Action(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Action::WILDCARD
    }

    /// Whether the action mutates repository content. The wildcard implies write.
    pub fn is_write(&self) -> bool {
        *self == Action::PUSH || *self == Action::DELETE || self.is_wildcard()
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free set of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse the action segment of a scope (`"pull,push"`).
    ///
    /// Blank entries are skipped, so `""` parses to the empty set.
    pub fn parse(segment: &str) -> Result<Self, DomainError> {
        let mut set = BTreeSet::new();
        for raw in segment.split(',') {
            let action = raw.trim();
            if action.is_empty() {
                continue;
            }
            if action.chars().any(|c| c.is_whitespace() || c.is_control() || c == ':') {
                return Err(DomainError::invalid_scope(format!("malformed action '{action}'")));
            }
            set.insert(Action::new(action.to_string()));
        }
        Ok(Self(set))
    }

    /// Set intersection. The only narrowing primitive used by the engine.
    pub fn intersect(&self, permitted: &ActionSet) -> ActionSet {
        Self(self.0.intersection(&permitted.0).cloned().collect())
    }

    pub fn is_subset(&self, other: &ActionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn contains_write(&self) -> bool {
        self.0.iter().any(Action::is_write)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

impl core::fmt::Display for ActionSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for action in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(action.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ActionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| Action::new(s.to_string())).collect())
    }
}

impl IntoIterator for ActionSet {
    type Item = Action;
    type IntoIter = std::collections::btree_set::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
