//! Error types for the TRUSTGATE pipeline.
//!
//! All fallible operations return `TrustResult<T>`. Variants carry the
//! offending line or action index where there is one, so a front end can
//! point at the exact plan entry.

use thiserror::Error;

use crate::run::RunState;

/// The unified error type for the trust layer.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The submitted plan text is malformed. Nothing was recorded.
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A path escapes the environment's workspace.
    #[error("path '{path}' resolves outside the sandbox")]
    PathViolation { line: Option<usize>, path: String },

    /// An environment lock or the allowed-actions list blocks the run.
    #[error("policy violation: {reason}")]
    PolicyViolation { action_index: Option<usize>, reason: String },

    /// A policy document failed validation. The previous config is still active.
    #[error("configuration error: {}", .problems.join("; "))]
    Config { problems: Vec<String> },

    /// Pre-execution capture failed. No action ran.
    #[error("snapshot failed for '{path}': {reason}")]
    Snapshot { path: String, reason: String },

    /// A path, run, or snapshot that must exist does not.
    #[error("not found: {what}")]
    NotFound { action_index: Option<usize>, what: String },

    /// The destination of an action is already occupied.
    #[error("conflict: '{path}' already exists")]
    Conflict { action_index: Option<usize>, path: String },

    /// Any other file-system failure while applying an action.
    #[error("action {action_index} failed: {reason}")]
    Execution { action_index: usize, reason: String },

    /// A file-system failure outside any single action (sandbox setup,
    /// snapshot storage, audit log files).
    #[error("i/o error at '{path}': {reason}")]
    Io { path: String, reason: String },

    /// The approval state machine does not allow this move.
    #[error("run {run_id}: cannot move from {from} to {to}")]
    InvalidTransition { run_id: String, from: RunState, to: RunState },

    /// An approval request is malformed (e.g. no approver identity).
    #[error("invalid approval request: {reason}")]
    InvalidApproval { reason: String },

    /// The audit writer could not persist a record.
    ///
    /// Fatal for the operation in progress: an event that cannot be audited
    /// does not happen.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A thread panicked while holding shared run state.
    #[error("{what} lock poisoned")]
    LockPoisoned { what: String },
}

impl TrustError {
    /// Stable class name for UIs and audit payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TrustError::Parse { .. } => "ParseError",
            TrustError::PathViolation { .. } => "PathViolationError",
            TrustError::PolicyViolation { .. } => "PolicyViolationError",
            TrustError::Config { .. } => "ConfigError",
            TrustError::Snapshot { .. } => "SnapshotError",
            TrustError::NotFound { .. } => "NotFoundError",
            TrustError::Conflict { .. } => "ConflictError",
            TrustError::Execution { .. } => "ExecutionError",
            TrustError::Io { .. } => "IoError",
            TrustError::InvalidTransition { .. } => "InvalidTransitionError",
            TrustError::InvalidApproval { .. } => "InvalidApprovalError",
            TrustError::AuditWriteFailed { .. } => "AuditWriteError",
            TrustError::LockPoisoned { .. } => "LockPoisonedError",
        }
    }

    /// The plan entry the error concerns, if any.
    pub fn action_index(&self) -> Option<usize> {
        match self {
            TrustError::PolicyViolation { action_index, .. }
            | TrustError::NotFound { action_index, .. }
            | TrustError::Conflict { action_index, .. } => *action_index,
            TrustError::Execution { action_index, .. } => Some(*action_index),
            _ => None,
        }
    }

    /// Attach an action index to the per-action variants that lack one.
    pub fn at_action(self, index: usize) -> Self {
        match self {
            TrustError::PolicyViolation { reason, .. } => TrustError::PolicyViolation {
                action_index: Some(index),
                reason,
            },
            TrustError::NotFound { what, .. } => TrustError::NotFound {
                action_index: Some(index),
                what,
            },
            TrustError::Conflict { path, .. } => TrustError::Conflict {
                action_index: Some(index),
                path,
            },
            other => other,
        }
    }
}

/// Convenience alias used throughout the TRUSTGATE crates.
pub type TrustResult<T> = Result<T, TrustError>;
