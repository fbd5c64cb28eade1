use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::LedgerError;
use crate::{check_storable, Ledger, LedgerEntry};

/// File-backed ledger: one `name=value` line per entry, append-only.
///
/// The format matches the address files the predecessor scripts appended
/// to. Cold load is last-write-wins per name, tolerating the duplicates
/// and `\r\n` endings those scripts produced; within a process lifetime
/// `put` strictly refuses duplicates. Every `put` flushes and fsyncs
/// before returning, so a crash after `put` never loses the entry.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    file: File,
    entries: Vec<LedgerEntry>,
}

impl FileLedger {
    /// Open an existing ledger file, or create an empty one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let entries = parse(&content)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Ledger for FileLedger {
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

        writeln!(self.file, "{name}={value}")?;
        self.file.flush()?;
        self.file.sync_all()?;

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

fn parse(content: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
    let loaded_at = Utc::now();
    let mut entries: Vec<LedgerEntry> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            return Err(LedgerError::Corrupt {
                line: idx + 1,
                content: line.to_string(),
            });
        };
        if name.is_empty() {
            return Err(LedgerError::Corrupt {
                line: idx + 1,
                content: line.to_string(),
            });
        }

        // Last write wins on load; keep the first-seen position.
        match entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => entries.push(LedgerEntry {
                name: name.to_string(),
                value: value.to_string(),
                created_at: loaded_at,
            }),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("address.txt")
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);

        {
            let mut ledger = FileLedger::open(&path).unwrap();
            ledger.put("KatanaNftFactory", "0xAAA").unwrap();
            ledger.put("DaapNFTCreator", "0xBBB").unwrap();
            ledger.put("Configurations", "0xCCC").unwrap();
        }

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.entries().len(), 3);
        assert_eq!(ledger.get("KatanaNftFactory").unwrap(), "0xAAA");
        assert_eq!(ledger.get("DaapNFTCreator").unwrap(), "0xBBB");
        assert_eq!(ledger.get("Configurations").unwrap(), "0xCCC");
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);

        let ledger = FileLedger::open(&path).unwrap();
        assert!(ledger.entries().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_duplicate_put_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = FileLedger::open(temp_path(&dir)).unwrap();

        ledger.put("X", "v1").unwrap();
        assert!(matches!(
            ledger.put("X", "v2"),
            Err(LedgerError::AlreadyExists(_))
        ));
        assert_eq!(ledger.get("X").unwrap(), "v1");
    }

    #[test]
    fn test_cold_load_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        // The old scripts appended unconditionally, CRLF included.
        std::fs::write(&path, "Factory=0xOLD\r\nCreator=0xBBB\r\nFactory=0xNEW\r\n").unwrap();

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.get("Factory").unwrap(), "0xNEW");
        assert_eq!(ledger.get("Creator").unwrap(), "0xBBB");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        std::fs::write(&path, "A=1\n\nB=2\n").unwrap();

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn test_corrupt_line_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        std::fs::write(&path, "A=1\nnot a pair\n").unwrap();

        match FileLedger::open(&path) {
            Err(LedgerError::Corrupt { line, content }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "not a pair");
            }
            other => panic!("Expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_value_may_contain_equals() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        std::fs::write(&path, "A=x=y\n").unwrap();

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.get("A").unwrap(), "x=y");
    }

    #[test]
    fn test_reopen_after_partial_run_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);

        {
            let mut ledger = FileLedger::open(&path).unwrap();
            ledger.put("Factory", "0xAAA").unwrap();
        }
        {
            let mut ledger = FileLedger::open(&path).unwrap();
            assert!(ledger.has("Factory"));
            ledger.put("Creator", "0xBBB").unwrap();
        }

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.entries().len(), 2);
    }
}
