use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No ledger entry named '{0}'")]
    NotFound(String),

    #[error("Ledger entry '{0}' already exists; entries are never overwritten")]
    AlreadyExists(String),

    #[error("Entry '{name}' is not storable: {reason}")]
    InvalidEntry { name: String, reason: String },

    #[error("Corrupt ledger line {line}: {content:?}")]
    Corrupt { line: usize, content: String },

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
}
