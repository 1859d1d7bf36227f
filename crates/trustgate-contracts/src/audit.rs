//! Audit entry types.
//!
//! An `AuditEntry` is what the trust layer hands to an `AuditWriter`. The
//! writer wraps it with a sequence number and checksums to form the chain;
//! the entry itself carries only the event.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::RunId;

/// Every event class the trust layer records.
///
/// Failure events are distinct variants so that a reader can tell a
/// rejected reload or a refused approval apart from a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventKind {
    PlanSubmitted,
    PlanScored,
    StateTransition,
    ApprovalRecorded,
    ApprovalDenied,
    SnapshotCaptured,
    SnapshotFailed,
    ActionExecuted,
    ActionFailed,
    SnapshotRestored,
    ConfigReloaded,
    ConfigRejected,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One auditable event, before it is chained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The run the event belongs to. `None` for process-wide events such as
    /// config reloads.
    pub run_id: Option<RunId>,
    pub event: AuditEventKind,
    /// Event body. State transitions always carry `from`, `to`, `rationale`.
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// An entry for `run_id` stamped now.
    pub fn for_run(run_id: RunId, event: AuditEventKind, payload: Value) -> Self {
        Self {
            run_id: Some(run_id),
            event,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// A process-wide entry stamped now.
    pub fn global(event: AuditEventKind, payload: Value) -> Self {
        Self {
            run_id: None,
            event,
            payload,
            timestamp: Utc::now(),
        }
    }
}
