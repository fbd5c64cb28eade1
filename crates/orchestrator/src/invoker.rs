use std::collections::BTreeMap;

use async_trait::async_trait;
use rollout_core::ActionRef;
use thiserror::Error;

/// Failure of a single remote action.
///
/// `retryable` signals that re-invoking the run with the same plan and
/// ledger is worth attempting; non-retryable failures need a plan edit or
/// operator intervention first.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct InvokerError {
    pub message: String,
    pub retryable: bool,
}

impl InvokerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// External collaborator performing the actual remote effect of a step.
///
/// The orchestrator never interprets the action: it may deploy a contract,
/// call a setter, or run any other remote effect. `dependency_values` maps
/// each declared dependency name to its resolved value.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn perform(
        &self,
        action: &ActionRef,
        dependency_values: &BTreeMap<String, String>,
    ) -> std::result::Result<String, InvokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let e = InvokerError::retryable("rpc timeout");
        assert!(e.retryable);
        assert_eq!(e.to_string(), "rpc timeout");

        let e = InvokerError::fatal("revert: bad constructor arg");
        assert!(!e.retryable);
    }
}
