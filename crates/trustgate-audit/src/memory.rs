//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps every record in a `Vec` behind a `Mutex`.
//! Clones share the same chain, so a test or a front end can hold one
//! handle while the trust layer writes through another.
//!
//! Use `export_log()` for a sealed `AuditLog`, and `verify_integrity()` at
//! any time to confirm the chain has not been tampered with in memory.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

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

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct InMemoryState {
    pub(crate) records: Vec<AuditRecord>,
    pub(crate) head: ChainHead,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An in-memory, append-only audit writer backed by a checksum chain.
#[derive(Clone, Default)]
pub struct InMemoryAuditWriter {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record written so far.
    pub fn records(&self) -> TrustResult<Vec<AuditRecord>> {
        Ok(self.lock()?.records.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export a sealed `AuditLog` containing all records written so far.
    pub fn export_log(&self) -> TrustResult<AuditLog> {
        Ok(AuditLog::from_records(self.records()?))
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> TrustResult<ChainReport> {
        Ok(verify_chain(&self.lock()?.records))
    }

    fn lock(&self) -> TrustResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| TrustError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    /// Seal `entry` onto the chain.
    ///
    /// The lock is held across read-head, hash, push and advance so that
    /// concurrent writers cannot interleave.
    fn append(&self, entry: &AuditEntry) -> TrustResult<()> {
        let mut state = self.lock()?;
        let record = state.head.seal(entry)?;
        state.head.advance(&record);

        debug!(
            sequence = record.sequence,
            event = %record.entry.event,
            "audit record appended"
        );
        state.records.push(record);
        Ok(())
    }
}
