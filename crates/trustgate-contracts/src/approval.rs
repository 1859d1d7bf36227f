//! Approval decision types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::RunId;

/// The outcome of the approval gate for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
    /// Granted by the gate itself: Low risk, writable environment.
    AutoApproved,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Approved => "Approved",
            Decision::Rejected => "Rejected",
            Decision::AutoApproved => "AutoApproved",
        };
        f.write_str(s)
    }
}

/// A recorded approval decision. Written to the audit log and kept on the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub run_id: RunId,
    pub decision: Decision,
    /// Free-text identity of whoever decided. `policy` for auto-approval.
    pub approver: String,
    pub timestamp: DateTime<Utc>,
    pub rationale: String,
}

/// A human decision submitted through the approval interface.
///
/// Only `Approved` and `Rejected` are accepted from callers; auto-approval
/// is reserved for the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub run_id: RunId,
    pub decision: Decision,
    pub approver: String,
    pub rationale: String,
}

impl ApprovalRequest {
    pub fn approve(run_id: RunId, approver: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            run_id,
            decision: Decision::Approved,
            approver: approver.into(),
            rationale: rationale.into(),
        }
    }

    pub fn reject(run_id: RunId, approver: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            run_id,
            decision: Decision::Rejected,
            approver: approver.into(),
            rationale: rationale.into(),
        }
    }
}
