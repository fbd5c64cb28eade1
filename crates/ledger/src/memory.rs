use chrono::Utc;

use crate::error::LedgerError;
use crate::{check_storable, Ledger, LedgerEntry};

/// In-memory ledger for tests and ephemeral runs (`--no-ledger`).
///
/// Same duplicate-rejection contract as [`crate::FileLedger`], no
/// durability.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, name: &str) -> Result<String, LedgerError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.clone())
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }

    fn put(&mut self, name: &str, value: &str) -> Result<(), LedgerError> {
        check_storable(name, value)?;
        if self.has(name) {
            return Err(LedgerError::AlreadyExists(name.to_string()));
        }
        self.entries.push(LedgerEntry {
            name: name.to_string(),
            value: value.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}
