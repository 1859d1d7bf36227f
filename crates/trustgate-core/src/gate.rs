//! The approval gate: the run state machine.
//!
//! ```text
//! Submitted -> Scored -> AutoApproved | PendingApproval
//! PendingApproval -> Approved | Rejected -> Aborted
//! Approved | AutoApproved -> Executed | Aborted
//! ```
//!
//! Every transition appends exactly one audit record carrying `from`, `to`
//! and `rationale`. A refused approval appends an `ApprovalDenied` record
//! and leaves the state unchanged.
//!
//! The environment lock is a wall, not a risk: a lock-blocked run is parked
//! as a `PolicyBlock` and no approver can move it to `Approved`.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use trustgate_contracts::{
    approval::{ApprovalDecision, Decision},
    audit::{AuditEntry, AuditEventKind},
    error::{TrustError, TrustResult},
    execution::ExecutionReport,
    plan::Plan,
    risk::{PlanAssessment, RiskTier},
    run::{PendingReason, RunRecord, RunState, Transition},
};

use crate::traits::{AuditWriter, PolicyEngine};

/// Identity recorded for decisions the gate makes on its own.
pub const POLICY_APPROVER: &str = "policy";

/// Drives `RunRecord`s through the state machine against the live policy.
pub struct ApprovalGate<'a> {
    policy: &'a dyn PolicyEngine,
    audit: &'a dyn AuditWriter,
}

impl<'a> ApprovalGate<'a> {
    pub fn new(policy: &'a dyn PolicyEngine, audit: &'a dyn AuditWriter) -> Self {
        Self { policy, audit }
    }

    /// `Submitted -> Scored`, recording the assessment.
    pub fn record_scores(&self, run: &mut RunRecord, assessment: PlanAssessment) -> TrustResult<()> {
        let details = json!({
            "tier": assessment.tier,
            "assessments": assessment.actions,
        });
        let rationale = format!("aggregate risk {}", assessment.tier);
        self.transition(run, RunState::Scored, AuditEventKind::PlanScored, rationale, details)?;
        run.assessment = Some(assessment);
        Ok(())
    }

    /// `Scored -> AutoApproved | PendingApproval`.
    ///
    /// Auto-approval requires Low risk, a writable environment, and every
    /// kind allowed. A lock or disallowed kind parks the run as a policy
    /// block even when the risk is Low.
    pub fn route(&self, run: &mut RunRecord) -> TrustResult<RunState> {
        let tier = run.tier();
        let block = policy_block(&run.plan, self.policy);

        match (block, tier) {
            (None, RiskTier::Low) => {
                let decision = ApprovalDecision {
                    run_id: run.run_id(),
                    decision: Decision::AutoApproved,
                    approver: POLICY_APPROVER.to_string(),
                    timestamp: Utc::now(),
                    rationale: "Auto-approved (Low risk)".to_string(),
                };
                let details = json!({ "decision": decision });
                self.transition(
                    run,
                    RunState::AutoApproved,
                    AuditEventKind::ApprovalRecorded,
                    decision.rationale.clone(),
                    details,
                )?;
                run.decision = Some(decision);
            }
            (block, tier) => {
                let pending = match block {
                    Some(reason) => PendingReason::PolicyBlock { reason },
                    None => PendingReason::Risk { tier },
                };
                let rationale = match &pending {
                    PendingReason::PolicyBlock { reason } => format!("policy block: {}", reason),
                    PendingReason::Risk { tier } => format!("{} risk requires human approval", tier),
                };
                let details = json!({ "pending": pending });
                self.transition(
                    run,
                    RunState::PendingApproval,
                    AuditEventKind::StateTransition,
                    rationale,
                    details,
                )?;
                run.pending = Some(pending);
            }
        }
        Ok(run.state)
    }

    /// `PendingApproval -> Approved`.
    ///
    /// Re-validates the live policy first: a locked environment or a kind
    /// removed from `allowed_actions` since submission fails with
    /// `PolicyViolation` and the run stays pending.
    pub fn approve(&self, run: &mut RunRecord, approver: &str, rationale: &str) -> TrustResult<RunState> {
        let approver = approver.trim();
        if approver.is_empty() {
            let err = TrustError::InvalidApproval {
                reason: "an approver identity is required".to_string(),
            };
            return Err(self.deny(run, RunState::Approved, approver, err)?);
        }
        if run.state != RunState::PendingApproval {
            let err = self.invalid(run, RunState::Approved);
            return Err(self.deny(run, RunState::Approved, approver, err)?);
        }
        if let Some(reason) = policy_block(&run.plan, self.policy) {
            let err = TrustError::PolicyViolation { action_index: None, reason };
            return Err(self.deny(run, RunState::Approved, approver, err)?);
        }

        let decision = ApprovalDecision {
            run_id: run.run_id(),
            decision: Decision::Approved,
            approver: approver.to_string(),
            timestamp: Utc::now(),
            rationale: rationale.to_string(),
        };
        let details = json!({ "decision": decision });
        self.transition(
            run,
            RunState::Approved,
            AuditEventKind::ApprovalRecorded,
            format!("approved by {}", approver),
            details,
        )?;
        run.decision = Some(decision);
        Ok(run.state)
    }

    /// `PendingApproval -> Rejected -> Aborted`.
    pub fn reject(&self, run: &mut RunRecord, approver: &str, rationale: &str) -> TrustResult<RunState> {
        let approver = approver.trim();
        if approver.is_empty() {
            let err = TrustError::InvalidApproval {
                reason: "an approver identity is required".to_string(),
            };
            return Err(self.deny(run, RunState::Rejected, approver, err)?);
        }
        if run.state != RunState::PendingApproval {
            let err = self.invalid(run, RunState::Rejected);
            return Err(self.deny(run, RunState::Rejected, approver, err)?);
        }

        let decision = ApprovalDecision {
            run_id: run.run_id(),
            decision: Decision::Rejected,
            approver: approver.to_string(),
            timestamp: Utc::now(),
            rationale: rationale.to_string(),
        };
        let details = json!({ "decision": decision });
        self.transition(
            run,
            RunState::Rejected,
            AuditEventKind::ApprovalRecorded,
            format!("rejected by {}", approver),
            details,
        )?;
        run.decision = Some(decision);

        self.transition(
            run,
            RunState::Aborted,
            AuditEventKind::StateTransition,
            "run rejected".to_string(),
            Value::Null,
        )?;
        Ok(run.state)
    }

    /// `Approved | AutoApproved -> Executed | Aborted` from an execution report.
    pub fn finish(&self, run: &mut RunRecord, report: ExecutionReport) -> TrustResult<RunState> {
        let (to, rationale) = match &report.failure {
            None => (
                RunState::Executed,
                format!("{} action(s) applied", report.succeeded.len()),
            ),
            Some(failure) => (
                RunState::Aborted,
                format!(
                    "action {} failed ({}); {} applied before the failure",
                    failure.action_index,
                    failure.error_kind,
                    report.succeeded.len()
                ),
            ),
        };
        let details = json!({
            "applied": report.succeeded.iter().map(|o| o.action_index).collect::<Vec<_>>(),
            "failure": report.failure,
        });
        self.transition(run, to, AuditEventKind::StateTransition, rationale, details)?;
        run.report = Some(report);
        Ok(run.state)
    }

    /// `Approved | AutoApproved -> Aborted` before any action ran.
    pub fn abort(&self, run: &mut RunRecord, cause: &TrustError) -> TrustResult<RunState> {
        let details = json!({ "error_kind": cause.kind(), "error": cause.to_string() });
        self.transition(
            run,
            RunState::Aborted,
            AuditEventKind::StateTransition,
            format!("aborted before execution: {}", cause),
            details,
        )?;
        Ok(run.state)
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Validate, audit, then apply one transition.
    ///
    /// The audit record is written before the state changes, so a failed
    /// append leaves the run where it was.
    fn transition(
        &self,
        run: &mut RunRecord,
        to: RunState,
        event: AuditEventKind,
        rationale: String,
        details: Value,
    ) -> TrustResult<()> {
        let from = run.state;
        if !from.can_transition_to(to) {
            return Err(self.invalid(run, to));
        }

        let mut payload = json!({
            "from": from,
            "to": to,
            "rationale": rationale,
        });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), details) {
            target.extend(extra);
        }
        self.audit.append(&AuditEntry::for_run(run.run_id(), event, payload))?;

        debug!(run_id = %run.run_id(), from = %from, to = %to, "run transitioned");
        run.state = to;
        run.history.push(Transition {
            from,
            to,
            rationale,
            at: Utc::now(),
        });
        Ok(())
    }

    fn invalid(&self, run: &RunRecord, to: RunState) -> TrustError {
        TrustError::InvalidTransition {
            run_id: run.run_id().to_string(),
            from: run.state,
            to,
        }
    }

    /// Record a refused decision and hand the error back for returning.
    pub(crate) fn deny(
        &self,
        run: &RunRecord,
        attempted: RunState,
        approver: &str,
        err: TrustError,
    ) -> TrustResult<TrustError> {
        warn!(
            run_id = %run.run_id(),
            state = %run.state,
            attempted = %attempted,
            approver = %approver,
            error = %err,
            "approval request refused"
        );
        self.audit.append(&AuditEntry::for_run(
            run.run_id(),
            AuditEventKind::ApprovalDenied,
            json!({
                "state": run.state,
                "attempted": attempted,
                "approver": approver,
                "error_kind": err.kind(),
                "error": err.to_string(),
            }),
        ))?;
        Ok(err)
    }
}

/// Return why the live policy forbids this plan outright, if it does.
pub fn policy_block(plan: &Plan, policy: &dyn PolicyEngine) -> Option<String> {
    // One snapshot of the policy for both checks.
    let config = policy.current();
    if config.is_locked(plan.environment) {
        return Some(format!("environment '{}' is locked", plan.environment));
    }
    let disallowed: Vec<String> = plan
        .actions
        .iter()
        .filter(|a| !config.is_allowed(a.kind))
        .map(|a| format!("{} (action {})", a.kind, a.index))
        .collect();
    if disallowed.is_empty() {
        None
    } else {
        info!(run_id = %plan.run_id, disallowed = ?disallowed, "plan uses disallowed actions");
        Some(format!("actions not in allowed_actions: {}", disallowed.join(", ")))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
