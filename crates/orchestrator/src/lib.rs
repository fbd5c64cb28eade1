pub mod command;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod plan_file;
pub mod state_machine;

pub use command::CommandInvoker;
pub use error::{OrchestratorError, Result};
pub use executor::{CancelHandle, Orchestrator};
pub use invoker::{Invoker, InvokerError};
pub use plan_file::{load_plan, parse_plan};
pub use state_machine::{StepState, StepStateMachine};
