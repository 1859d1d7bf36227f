//! Exportable audit log.
//!
//! An `AuditLog` is a point-in-time copy of a chain together with its
//! verification report, suitable for handing to a reviewer as one JSON
//! document.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trustgate_contracts::{
    error::{TrustError, TrustResult},
    plan::RunId,
};

use crate::chain::{verify_chain, ChainReport};
use crate::event::AuditRecord;

/// A sealed copy of the audit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    /// All records in chain order (sequence 0 first).
    pub records: Vec<AuditRecord>,

    /// Result of verifying `records` at export time.
    pub verification: ChainReport,

    pub exported_at: DateTime<Utc>,

    /// The `checksum` of the last record. Empty string if the log is empty.
    pub terminal_checksum: String,
}

impl AuditLog {
    /// Verify `records` and seal them into a log.
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        let verification = verify_chain(&records);
        let terminal_checksum = records
            .last()
            .map(|r| r.checksum.clone())
            .unwrap_or_default();
        Self {
            records,
            verification,
            exported_at: Utc::now(),
            terminal_checksum,
        }
    }

    /// Records that belong to `run_id`, in chain order.
    pub fn for_run(&self, run_id: RunId) -> impl Iterator<Item = &AuditRecord> {
        self.records
            .iter()
            .filter(move |r| r.entry.run_id == Some(run_id))
    }

    pub fn to_pretty_json(&self) -> TrustResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TrustError::AuditWriteFailed {
            reason: format!("failed to serialise audit export: {}", e),
        })
    }

    /// Write the pretty JSON export to `path`.
    pub fn write_to(&self, path: &Path) -> TrustResult<()> {
        let json = self.to_pretty_json()?;
        std::fs::write(path, json).map_err(|e| TrustError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
