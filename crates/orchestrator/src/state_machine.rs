use crate::error::{OrchestratorError, Result};

/// Lifecycle of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Skipped,
    Ran,
    Failed,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Skipped => "skipped",
            Self::Ran => "ran",
            Self::Failed => "failed",
        }
    }
}

pub struct StepStateMachine;

impl StepStateMachine {
    pub fn validate_transition(from: &StepState, to: &StepState) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &StepState) -> Vec<StepState> {
        match from {
            StepState::Pending => vec![StepState::Skipped, StepState::Running],
            StepState::Running => vec![StepState::Ran, StepState::Failed],
            // Terminal states
            StepState::Skipped | StepState::Ran | StepState::Failed => vec![],
        }
    }

    pub fn can_transition(from: &StepState, to: &StepState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    pub fn is_terminal(state: &StepState) -> bool {
        Self::allowed_transitions(state).is_empty()
    }
}
