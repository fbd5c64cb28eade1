use std::path::PathBuf;

use ledger::LedgerError;
use rollout_core::PlanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid plan: {0}")]
    Validation(#[from] PlanError),

    #[error("Invalid step transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Step '{step}' has no value for dependency '{dependency}'")]
    MissingDependencyValue { step: String, dependency: String },

    #[error("Ledger failure while recording step '{step}': {source}")]
    Ledger {
        step: String,
        #[source]
        source: LedgerError,
    },

    #[error("Cannot read plan file {path}: {source}")]
    PlanFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse plan file: {0}")]
    PlanFileParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
