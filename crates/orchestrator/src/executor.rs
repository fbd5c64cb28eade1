use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use events::{EventBus, EventEnvelope, RunEvent};
use ledger::Ledger;
use rollout_core::{ExecutionReport, Plan, Step, StepFailure, StepOutcome, StepResult};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::invoker::Invoker;
use crate::state_machine::{StepState, StepStateMachine};

/// Clonable cancellation flag shared between the caller and a run.
///
/// Cancellation stops the orchestrator from issuing new invoker calls; a
/// call already in flight is awaited to settlement and recorded, because
/// remote deployments are not safely cancelable mid-flight.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Executes a plan against a ledger, one step at a time.
///
/// Steps whose idempotency key is already in the ledger are skipped with
/// the stored value; the rest are performed through the invoker and their
/// value is persisted before the next step starts. The first invoker
/// failure halts the remaining plan. Re-running with the same ledger
/// resumes: settled steps become ledger hits and the failed step is
/// retried.
#[derive(Debug, Default)]
pub struct Orchestrator {
    event_bus: Option<EventBus>,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        plan: &Plan,
        ledger: &mut dyn Ledger,
        invoker: &dyn Invoker,
    ) -> Result<ExecutionReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        // Fail fast: nothing runs against an invalid plan.
        let ordered = plan.order()?;

        info!(%run_id, steps = ordered.len(), "Starting run");
        self.publish(
            run_id,
            RunEvent::RunStarted {
                plan_steps: ordered.len(),
            },
        );

        let mut results: Vec<StepResult> = Vec::with_capacity(ordered.len());
        let mut cancelled = false;

        for step in ordered {
            if self.cancel.is_cancelled() {
                warn!(%run_id, step = %step.name, "Run cancelled before step");
                cancelled = true;
                break;
            }

            let mut state = StepState::Pending;

            if ledger.has(&step.idempotency_key) {
                self.advance(&mut state, StepState::Skipped)?;
                let value = ledger
                    .get(&step.idempotency_key)
                    .map_err(|source| OrchestratorError::Ledger {
                        step: step.name.clone(),
                        source,
                    })?;

                info!(step = %step.name, key = %step.idempotency_key, "Already provisioned, skipping");
                self.publish(
                    run_id,
                    RunEvent::StepSkipped {
                        step: step.name.clone(),
                        value: value.clone(),
                    },
                );
                results.push(StepResult {
                    step: step.name.clone(),
                    outcome: StepOutcome::Skipped { value },
                });
                continue;
            }

            let dependency_values = resolve_dependency_values(plan, step, ledger)?;

            self.advance(&mut state, StepState::Running)?;
            debug!(step = %step.name, action = %step.action, deps = dependency_values.len(), "Performing action");
            self.publish(
                run_id,
                RunEvent::StepStarted {
                    step: step.name.clone(),
                    action: step.action.as_str().to_string(),
                },
            );

            match invoker.perform(&step.action, &dependency_values).await {
                Ok(value) => {
                    ledger
                        .put(&step.idempotency_key, &value)
                        .map_err(|source| OrchestratorError::Ledger {
                            step: step.name.clone(),
                            source,
                        })?;
                    self.advance(&mut state, StepState::Ran)?;

                    info!(step = %step.name, %value, "Step completed and recorded");
                    self.publish(
                        run_id,
                        RunEvent::StepRan {
                            step: step.name.clone(),
                            value: value.clone(),
                        },
                    );
                    results.push(StepResult {
                        step: step.name.clone(),
                        outcome: StepOutcome::Ran { value },
                    });
                }
                Err(e) => {
                    self.advance(&mut state, StepState::Failed)?;

                    error!(step = %step.name, error = %e.message, retryable = e.retryable, "Step failed, halting remaining plan");
                    self.publish(
                        run_id,
                        RunEvent::StepFailed {
                            step: step.name.clone(),
                            message: e.message.clone(),
                            retryable: e.retryable,
                        },
                    );
                    results.push(StepResult {
                        step: step.name.clone(),
                        outcome: StepOutcome::Failed {
                            error: StepFailure {
                                message: e.message,
                                retryable: e.retryable,
                            },
                        },
                    });
                    break;
                }
            }
        }

        let succeeded = !cancelled
            && results.len() == plan.len()
            && results.iter().all(|r| r.outcome.is_settled_ok());

        info!(%run_id, succeeded, cancelled, settled = results.len(), "Run finished");
        self.publish(
            run_id,
            RunEvent::RunFinished {
                succeeded,
                cancelled,
            },
        );

        Ok(ExecutionReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results,
            cancelled,
            succeeded,
        })
    }

    fn advance(&self, state: &mut StepState, to: StepState) -> Result<()> {
        StepStateMachine::validate_transition(state, &to)?;
        *state = to;
        Ok(())
    }

    fn publish(&self, run_id: Uuid, event: RunEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(EventEnvelope::new(run_id, event));
        }
    }
}

/// Map each dependency name of `step` to its value.
///
/// A dependency that is a step in the plan resolves through the ledger
/// (its idempotency key was recorded when it settled). Anything else is an
/// external input: a ledger entry from an earlier run wins over the value
/// declared in the plan, mirroring how the old scripts fell back to
/// `process.env` addresses.
fn resolve_dependency_values(
    plan: &Plan,
    step: &Step,
    ledger: &dyn Ledger,
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();

    for dep in &step.depends_on {
        let missing = || OrchestratorError::MissingDependencyValue {
            step: step.name.clone(),
            dependency: dep.clone(),
        };

        let value = match plan.step(dep) {
            Some(dep_step) => ledger.get(&dep_step.idempotency_key).map_err(|_| missing())?,
            None => match ledger.get(dep) {
                Ok(value) => value,
                Err(_) => plan.inputs().get(dep).cloned().ok_or_else(missing)?,
            },
        };
        values.insert(dep.clone(), value);
    }

    Ok(values)
}
