use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to the remote effect a step performs.
///
/// The orchestrator never interprets this; only an invoker does. For the
/// shell invoker it is a command line, but any invoker may assign it its
/// own meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionRef(String);

impl ActionRef {
    pub fn new(action: impl Into<String>) -> Self {
        Self(action.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, idempotent unit of provisioning work.
///
/// The idempotency key is the ledger lookup key deciding whether the step
/// already ran; it defaults to the step name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub depends_on: BTreeSet<String>,
    pub idempotency_key: String,
    pub action: ActionRef,
}

impl Step {
    pub fn new(name: impl Into<String>, action: ActionRef) -> Self {
        let name = name.into();
        Self {
            idempotency_key: name.clone(),
            name,
            depends_on: BTreeSet::new(),
            action,
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.depends_on.insert(dependency.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_creation() {
        let step = Step::new("factory", ActionRef::new("deploy-factory"));

        assert_eq!(step.name, "factory");
        assert_eq!(step.idempotency_key, "factory");
        assert!(step.depends_on.is_empty());
        assert_eq!(step.action.as_str(), "deploy-factory");
    }

    #[test]
    fn test_step_builders() {
        let step = Step::new("token", ActionRef::new("deploy-token"))
            .with_dependency("factory")
            .with_dependency("config")
            .with_idempotency_key("CharacterToken");

        assert_eq!(step.depends_on.len(), 2);
        assert!(step.depends_on.contains("factory"));
        assert_eq!(step.idempotency_key, "CharacterToken");
    }

    #[test]
    fn test_duplicate_dependency_collapses() {
        let step = Step::new("token", ActionRef::new("deploy-token"))
            .with_dependency("factory")
            .with_dependency("factory");

        assert_eq!(step.depends_on.len(), 1);
    }
}
