//! # trustgate-audit
//!
//! Immutable, append-only, SHA-256 checksum-chained audit trail for the
//! TRUSTGATE trust layer.
//!
//! ## Overview
//!
//! Every event the trust layer records is wrapped in an `AuditRecord` that
//! links to the previous record via its checksum. Tampering with any record,
//! even a single byte of its payload, breaks the chain from that record
//! onward and is detected by `verify_chain`.
//!
//! Two writers are provided: `InMemoryAuditWriter` for tests and embedding,
//! and `FileAuditWriter`, which persists the chain as JSON Lines and resumes
//! it when reopened.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trustgate_audit::{FileAuditWriter, AuditLog};
//!
//! let writer = Arc::new(FileAuditWriter::open(".trustgate/audit.jsonl")?);
//! // hand `writer` to the policy engine and the trust layer
//!
//! let report = FileAuditWriter::verify_file(".trustgate/audit.jsonl")?;
//! assert!(report.is_valid());
//! ```

pub mod chain;
pub mod event;
pub mod export;
pub mod file;
pub mod memory;

pub use chain::{checksum_entry, is_intact, verify_chain, ChainReport};
pub use event::AuditRecord;
pub use export::AuditLog;
pub use file::FileAuditWriter;
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use trustgate_contracts::{
        audit::{AuditEntry, AuditEventKind},
        plan::RunId,
    };
    use trustgate_core::traits::AuditWriter;

    use super::{verify_chain, AuditRecord, FileAuditWriter, InMemoryAuditWriter};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn entry(run_id: RunId, text: &str) -> AuditEntry {
        AuditEntry::for_run(run_id, AuditEventKind::StateTransition, json!({ "rationale": text }))
    }

    fn written(n: usize) -> InMemoryAuditWriter {
        let writer = InMemoryAuditWriter::new();
        let run_id = RunId::new();
        for i in 0..n {
            writer.append(&entry(run_id, &format!("step-{}", i))).unwrap();
        }
        writer
    }

    // ── In-memory chain ───────────────────────────────────────────────────────

    #[test]
    fn sequential_appends_verify() {
        let writer = written(3);
        assert!(writer.verify_integrity().unwrap().is_valid());
    }

    #[test]
    fn first_record_links_to_genesis() {
        let records = written(1).records().unwrap();
        assert_eq!(records[0].prev_checksum, AuditRecord::GENESIS_CHECKSUM);
        assert_eq!(records[0].checksum.len(), 64);
    }

    #[test]
    fn sequences_are_gapless() {
        let records = written(4).records().unwrap();
        for (idx, record) in records.iter().enumerate() {
            assert_eq!(record.sequence, idx as u64);
            if idx > 0 {
                assert_eq!(record.prev_checksum, records[idx - 1].checksum);
            }
        }
    }

    #[test]
    fn tampering_invalidates_the_record_and_everything_after() {
        let writer = written(5);
        {
            let mut state = writer.state.lock().unwrap();
            state.records[2].entry.payload = json!({ "rationale": "TAMPERED" });
        }

        let report = writer.verify_integrity().unwrap();
        assert_eq!(report.first_invalid, Some(2));
        assert_eq!(report.invalid, vec![2, 3, 4]);
    }

    #[test]
    fn deleting_a_record_is_detected() {
        let mut records = written(4).records().unwrap();
        records.remove(1);
        let report = verify_chain(&records);
        assert_eq!(report.first_invalid, Some(1));
        assert_eq!(report.invalid, vec![1, 2]);
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(InMemoryAuditWriter::new().verify_integrity().unwrap().is_valid());
        assert!(verify_chain(&[]).is_valid());
    }

    #[test]
    fn export_carries_terminal_checksum_and_report() {
        let writer = written(3);
        writer
            .append(&AuditEntry::global(AuditEventKind::ConfigReloaded, json!({})))
            .unwrap();

        let log = writer.export_log().unwrap();
        assert_eq!(log.records.len(), 4);
        assert_eq!(log.terminal_checksum, log.records[3].checksum);
        assert!(log.verification.is_valid());

        let run_id = log.records[0].entry.run_id.unwrap();
        assert_eq!(log.for_run(run_id).count(), 3);

        let json = log.to_pretty_json().unwrap();
        assert!(json.contains("terminal_checksum"));
    }

    #[test]
    fn concurrent_writers_keep_one_chain() {
        let writer = Arc::new(InMemoryAuditWriter::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let writer = Arc::clone(&writer);
                std::thread::spawn(move || {
                    let run_id = RunId::new();
                    for i in 0..25 {
                        writer.append(&entry(run_id, &format!("{}-{}", t, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(writer.len(), 100);
        assert!(writer.verify_integrity().unwrap().is_valid());
    }

    // ── File-backed chain ─────────────────────────────────────────────────────

    #[test]
    fn file_log_resumes_chain_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/audit.jsonl");
        let run_id = RunId::new();

        {
            let writer = FileAuditWriter::open(&path).unwrap();
            writer.append(&entry(run_id, "one")).unwrap();
            writer.append(&entry(run_id, "two")).unwrap();
        }
        {
            let writer = FileAuditWriter::open(&path).unwrap();
            writer.append(&entry(run_id, "three")).unwrap();
        }

        let records = FileAuditWriter::read_all(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].sequence, 2);
        assert!(FileAuditWriter::verify_file(&path).unwrap().is_valid());
    }

    #[test]
    fn edited_log_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let run_id = RunId::new();
        {
            let writer = FileAuditWriter::open(&path).unwrap();
            for text in ["alpha", "beta", "gamma"] {
                writer.append(&entry(run_id, text)).unwrap();
            }
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replacen("beta", "BETA", 1)).unwrap();

        let report = FileAuditWriter::verify_file(&path).unwrap();
        assert_eq!(report.invalid, vec![1, 2]);

        let log = FileAuditWriter::export_file(&path).unwrap();
        assert_eq!(log.verification.first_invalid, Some(1));
    }

    #[test]
    fn unreadable_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        let err = FileAuditWriter::read_all(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
