//! Append-only JSONL audit log on disk.
//!
//! One `AuditRecord` per line. Opening an existing log recovers the chain
//! head from its last line so new records link to the old ones; the file
//! is only ever opened in append mode.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use trustgate_contracts::{
    audit::AuditEntry,
    error::{TrustError, TrustResult},
};
use trustgate_core::traits::AuditWriter;

use crate::{
    chain::{verify_chain, ChainHead, ChainReport},
    event::AuditRecord,
    export::AuditLog,
};

struct FileState {
    writer: BufWriter<File>,
    head: ChainHead,
}

/// An `AuditWriter` that persists the chain as JSON Lines.
pub struct FileAuditWriter {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileAuditWriter {
    /// Open (or create) the log at `path`.
    ///
    /// A log that fails verification is still opened, so that new events are
    /// not lost, but the damage is logged; run `verify_file` for details.
    pub fn open(path: impl AsRef<Path>) -> TrustResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let head = if path.exists() {
            let records = Self::read_all(&path)?;
            let report = verify_chain(&records);
            if !report.is_valid() {
                warn!(
                    path = %path.display(),
                    first_invalid = ?report.first_invalid,
                    invalid = report.invalid.len(),
                    "existing audit log does not verify"
                );
            }
            records.last().map(ChainHead::after).unwrap_or_default()
        } else {
            ChainHead::default()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;

        info!(path = %path.display(), next_sequence = head.next_sequence, "audit log opened");
        Ok(Self {
            path,
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                head,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record from a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> TrustResult<Vec<AuditRecord>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let mut records = Vec::new();

        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_error(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(&line).map_err(|e| TrustError::Io {
                path: path.display().to_string(),
                reason: format!("line {}: {}", number + 1, e),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Verify the chain stored at `path`.
    pub fn verify_file(path: impl AsRef<Path>) -> TrustResult<ChainReport> {
        Ok(verify_chain(&Self::read_all(path)?))
    }

    /// Export the log stored at `path`.
    pub fn export_file(path: impl AsRef<Path>) -> TrustResult<AuditLog> {
        Ok(AuditLog::from_records(Self::read_all(path)?))
    }

    fn lock(&self) -> TrustResult<MutexGuard<'_, FileState>> {
        self.state.lock().map_err(|e| TrustError::AuditWriteFailed {
            reason: format!("audit log lock poisoned: {}", e),
        })
    }
}

impl AuditWriter for FileAuditWriter {
    /// Seal, write one line, flush, then advance the head.
    fn append(&self, entry: &AuditEntry) -> TrustResult<()> {
        let mut state = self.lock()?;
        let record = state.head.seal(entry)?;
        let line = serde_json::to_string(&record).map_err(|e| TrustError::AuditWriteFailed {
            reason: e.to_string(),
        })?;

        writeln!(state.writer, "{}", line)
            .and_then(|()| state.writer.flush())
            .map_err(|e| TrustError::AuditWriteFailed {
                reason: format!("failed to write '{}': {}", self.path.display(), e),
            })?;
        state.head.advance(&record);

        debug!(sequence = record.sequence, event = %record.entry.event, "audit record persisted");
        Ok(())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TrustError {
    TrustError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
