pub mod domain;
pub mod error;

pub use domain::plan::Plan;
pub use domain::report::{ExecutionReport, StepFailure, StepOutcome, StepResult};
pub use domain::step::{ActionRef, Step};
pub use error::PlanError;
