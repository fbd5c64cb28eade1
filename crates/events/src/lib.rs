//! Progress events published during an orchestrator run.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{EventEnvelope, RunEvent};
