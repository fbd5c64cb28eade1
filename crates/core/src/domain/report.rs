use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of a single step within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The ledger already held the idempotency key; the stored value was
    /// reused.
    Skipped { value: String },
    /// The invoker performed the action and the value was recorded.
    Ran { value: String },
    /// The invoker failed; the remaining plan was halted.
    Failed { error: StepFailure },
}

impl StepOutcome {
    pub fn is_settled_ok(&self) -> bool {
        matches!(self, Self::Skipped { .. } | Self::Ran { .. })
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Skipped { value } | Self::Ran { value } => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Ran { .. } => "ran",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Structured invoker failure as surfaced in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Immutable record of one orchestrator run.
///
/// Steps the run never reached (after a failure or a cancellation) are
/// absent from `results`; `succeeded` therefore also requires that every
/// planned step settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<StepResult>,
    pub cancelled: bool,
    pub succeeded: bool,
}

impl ExecutionReport {
    pub fn result(&self, step: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step == step)
    }

    /// The first failed step, if any.
    pub fn failure(&self) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }
}
