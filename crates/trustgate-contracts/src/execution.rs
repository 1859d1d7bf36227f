//! Execution results.
//!
//! `ExecutionReport` is what the executor returns after a run. A failed
//! action does not roll anything back: the report lists the actions that
//! were applied before the failure so the partial state is visible.

use serde::{Deserialize, Serialize};

use crate::{action::ActionKind, error::TrustError, plan::RunId};

/// One action that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_index: usize,
    pub kind: ActionKind,
    /// Human-readable summary, e.g. `moved tmp/a.txt -> tmp/b.txt`.
    pub summary: String,
}

/// The action that stopped a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub action_index: usize,
    /// `TrustError::kind()` of the underlying error.
    pub error_kind: String,
    pub message: String,
}

impl ActionFailure {
    pub fn from_error(action_index: usize, err: &TrustError) -> Self {
        Self {
            action_index,
            error_kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// The result of executing one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: RunId,
    /// Applied actions, in plan order.
    pub succeeded: Vec<ActionOutcome>,
    /// The first failure, if any. Later actions were not attempted.
    pub failure: Option<ActionFailure>,
    /// Actions never attempted because of the failure.
    pub skipped: usize,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
