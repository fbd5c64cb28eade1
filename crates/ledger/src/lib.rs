//! Durable name→value store for completed provisioning results.
//!
//! A ledger records one immutable entry per idempotency key. Entries are
//! append-only and never overwritten; reusing a prior value goes through
//! `get`, not through a second `put`.

pub mod error;
mod file;
mod memory;

pub use error::LedgerError;
pub use file::FileLedger;
pub use memory::MemoryLedger;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

pub trait Ledger: Send {
    /// Look up the value recorded under `name`.
    fn get(&self, name: &str) -> Result<String, LedgerError>;

    /// Record a new entry. Fails with `AlreadyExists` if `name` is already
    /// present; the durable backend flushes before returning.
    fn put(&mut self, name: &str, value: &str) -> Result<(), LedgerError>;

    fn has(&self, name: &str) -> bool;

    /// All entries in recorded order.
    fn entries(&self) -> &[LedgerEntry];
}

fn check_storable(name: &str, value: &str) -> Result<(), LedgerError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('=') {
        Some("name contains '='")
    } else if name.contains('\n') || name.contains('\r') {
        Some("name contains a line break")
    } else if value.contains('\n') || value.contains('\r') {
        Some("value contains a line break")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(LedgerError::InvalidEntry {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
