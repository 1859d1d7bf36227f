//! Run lifecycle states.
//!
//! ```text
//! Submitted -> Scored -> AutoApproved ----------------------> Executed | Aborted
//!                     -> PendingApproval -> Approved -------> Executed | Aborted
//!                                        -> Rejected -> Aborted
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    approval::ApprovalDecision,
    execution::ExecutionReport,
    plan::{Plan, RunId},
    risk::{PlanAssessment, RiskTier},
};

/// Where a run sits in the approval state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Submitted,
    Scored,
    AutoApproved,
    PendingApproval,
    Approved,
    Rejected,
    Executed,
    Aborted,
}

impl RunState {
    /// Return true if the state machine permits `self -> next`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Submitted, Scored)
                | (Scored, AutoApproved)
                | (Scored, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Rejected, Aborted)
                | (Approved, Executed)
                | (Approved, Aborted)
                | (AutoApproved, Executed)
                | (AutoApproved, Aborted)
        )
    }

    /// True for the two states from which the executor may run.
    pub fn is_executable(self) -> bool {
        matches!(self, RunState::Approved | RunState::AutoApproved)
    }

    /// True once nothing further can happen to the run.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Executed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Submitted => "Submitted",
            RunState::Scored => "Scored",
            RunState::AutoApproved => "AutoApproved",
            RunState::PendingApproval => "PendingApproval",
            RunState::Approved => "Approved",
            RunState::Rejected => "Rejected",
            RunState::Executed => "Executed",
            RunState::Aborted => "Aborted",
        };
        f.write_str(s)
    }
}

/// Why a scored run was parked in `PendingApproval`.
///
/// Front ends render `PolicyBlock` as a hard wall and `Risk` as a warning a
/// human may override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingReason {
    Risk { tier: RiskTier },
    PolicyBlock { reason: String },
}

impl PendingReason {
    pub fn is_policy_block(&self) -> bool {
        matches!(self, PendingReason::PolicyBlock { .. })
    }
}

/// One entry in a run's state history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: RunState,
    pub to: RunState,
    pub rationale: String,
    pub at: DateTime<Utc>,
}

/// Everything the trust layer knows about one run.
///
/// Owned by `TrustLayer`; callers receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub plan: Plan,
    pub state: RunState,
    /// Set once the plan has been scored.
    pub assessment: Option<PlanAssessment>,
    /// Set while (and after) the run waits for a human.
    pub pending: Option<PendingReason>,
    pub decision: Option<ApprovalDecision>,
    pub report: Option<ExecutionReport>,
    /// Whether a pre-execution snapshot was stored for this run.
    pub snapshot_taken: bool,
    pub history: Vec<Transition>,
}

impl RunRecord {
    /// A freshly submitted run.
    pub fn submitted(plan: Plan) -> Self {
        Self {
            plan,
            state: RunState::Submitted,
            assessment: None,
            pending: None,
            decision: None,
            report: None,
            snapshot_taken: false,
            history: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.plan.run_id
    }

    /// The aggregate tier, or `Low` before scoring.
    pub fn tier(&self) -> RiskTier {
        self.assessment
            .as_ref()
            .map(|a| a.tier)
            .unwrap_or_default()
    }
}
