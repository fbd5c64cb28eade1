use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Dependency cycle involving steps: {}", .involved.join(", "))]
    CyclicDependency { involved: Vec<String> },

    #[error("Step '{step}' depends on '{dependency}', which is neither a step in the plan nor a declared input")]
    UnresolvedDependency { step: String, dependency: String },
}
