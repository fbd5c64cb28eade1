use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every event with identity and timing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    /// The run this event belongs to.
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

impl EventEnvelope {
    pub fn new(run_id: Uuid, event: RunEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Everything an orchestrator run reports while in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    #[serde(rename = "run.started")]
    RunStarted { plan_steps: usize },

    #[serde(rename = "step.started")]
    StepStarted { step: String, action: String },

    /// Ledger hit; the stored value was reused without invoking anything.
    #[serde(rename = "step.skipped")]
    StepSkipped { step: String, value: String },

    #[serde(rename = "step.ran")]
    StepRan { step: String, value: String },

    #[serde(rename = "step.failed")]
    StepFailed {
        step: String,
        message: String,
        retryable: bool,
    },

    #[serde(rename = "run.finished")]
    RunFinished { succeeded: bool, cancelled: bool },
}

impl RunEvent {
    /// The step this event concerns, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            RunEvent::StepStarted { step, .. }
            | RunEvent::StepSkipped { step, .. }
            | RunEvent::StepRan { step, .. }
            | RunEvent::StepFailed { step, .. } => Some(step),
            RunEvent::RunStarted { .. } | RunEvent::RunFinished { .. } => None,
        }
    }
}
