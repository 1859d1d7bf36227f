//! `TrustLayer`: the trust-ordered orchestration of one sandbox.
//!
//!   submit: Parse → Score → Route
//!   decide: Approve | Reject
//!   execute: Snapshot → Executor → Finish
//!
//! Runs live in memory for the life of the layer. Execution and restore are
//! serialised so only one run touches the tree at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::{info, warn};

use trustgate_contracts::{
    action::Environment,
    approval::{ApprovalRequest, Decision},
    audit::{AuditEntry, AuditEventKind},
    error::{TrustError, TrustResult},
    execution::ExecutionReport,
    plan::{Plan, RunId},
    risk::PlanAssessment,
    run::{RunRecord, RunState},
    snapshot::RestoreReport,
};

use crate::executor::Executor;
use crate::gate::ApprovalGate;
use crate::parser::parse_plan;
use crate::sandbox::Sandbox;
use crate::traits::{AuditWriter, PolicyEngine, RiskScorer, SnapshotStore};

/// The trust layer for one sandbox root.
pub struct TrustLayer {
    executor: Executor,
    policy: Arc<dyn PolicyEngine>,
    scorer: Box<dyn RiskScorer>,
    audit: Arc<dyn AuditWriter>,
    snapshots: Box<dyn SnapshotStore>,
    runs: Mutex<HashMap<RunId, RunRecord>>,
    execution: Mutex<()>,
}

impl TrustLayer {
    /// Wire the trusted components together.
    ///
    /// `policy` and `audit` are shared so that a policy engine can write its
    /// reload events to the same chain.
    pub fn new(
        sandbox: Sandbox,
        policy: Arc<dyn PolicyEngine>,
        scorer: Box<dyn RiskScorer>,
        audit: Arc<dyn AuditWriter>,
        snapshots: Box<dyn SnapshotStore>,
    ) -> Self {
        Self {
            executor: Executor::new(sandbox),
            policy,
            scorer,
            audit,
            snapshots,
            runs: Mutex::new(HashMap::new()),
            execution: Mutex::new(()),
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        self.executor.sandbox()
    }

    pub fn policy(&self) -> &Arc<dyn PolicyEngine> {
        &self.policy
    }

    pub fn snapshots(&self) -> &dyn SnapshotStore {
        self.snapshots.as_ref()
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Parse, score and route a plan.
    ///
    /// A parse or path error rejects the whole submission and records
    /// nothing. Otherwise the run comes back `AutoApproved` or
    /// `PendingApproval`.
    pub fn submit(&self, text: &str, environment: Environment, task: Option<&str>) -> TrustResult<RunRecord> {
        let actions = match parse_plan(text, environment) {
            Ok(actions) => actions,
            Err(err) => {
                warn!(environment = %environment, error = %err, "plan rejected by parser");
                return Err(err);
            }
        };
        let plan = Plan::new(environment, actions, task.map(str::to_string));

        self.audit.append(&AuditEntry::for_run(
            plan.run_id,
            AuditEventKind::PlanSubmitted,
            json!({
                "environment": plan.environment,
                "task": plan.task,
                "actions": plan.actions.iter().map(|a| a.raw.as_str()).collect::<Vec<_>>(),
            }),
        ))?;

        // One config for the whole plan, even if a reload lands mid-score.
        let config = self.policy.current();
        let assessment = PlanAssessment::new(
            plan.actions
                .iter()
                .map(|action| self.scorer.score(action, &config))
                .collect(),
        );

        let gate = self.gate();
        let mut run = RunRecord::submitted(plan);
        gate.record_scores(&mut run, assessment)?;
        let state = gate.route(&mut run)?;

        info!(
            run_id = %run.run_id(),
            environment = %environment,
            actions = run.plan.actions.len(),
            tier = %run.tier(),
            state = %state,
            "plan submitted"
        );

        self.lock_runs()?.insert(run.run_id(), run.clone());
        Ok(run)
    }

    // ── Approval ─────────────────────────────────────────────────────────────

    /// Apply a human decision to a pending run and return its new state.
    pub fn decide(&self, request: ApprovalRequest) -> TrustResult<RunState> {
        let gate = self.gate();
        let mut runs = self.lock_runs()?;
        let run = runs
            .get_mut(&request.run_id)
            .ok_or_else(|| unknown_run(request.run_id))?;

        match request.decision {
            Decision::Approved => gate.approve(run, &request.approver, &request.rationale),
            Decision::Rejected => gate.reject(run, &request.approver, &request.rationale),
            Decision::AutoApproved => {
                let err = TrustError::InvalidApproval {
                    reason: "auto-approval is granted by policy, not requested".to_string(),
                };
                Err(gate.deny(run, RunState::AutoApproved, &request.approver, err)?)
            }
        }
    }

    pub fn approve(&self, run_id: RunId, approver: &str, rationale: &str) -> TrustResult<RunState> {
        self.decide(ApprovalRequest::approve(run_id, approver, rationale))
    }

    pub fn reject(&self, run_id: RunId, approver: &str, rationale: &str) -> TrustResult<RunState> {
        self.decide(ApprovalRequest::reject(run_id, approver, rationale))
    }

    // ── Execution ────────────────────────────────────────────────────────────

    /// Snapshot, then execute an approved run.
    ///
    /// # Errors
    ///
    /// - `PolicyViolation` if the run is not approved; nothing is captured.
    /// - `Snapshot` if capture fails; the run is aborted before any action.
    /// - `PolicyViolation` if an earlier call already stored a snapshot for
    ///   this run but did not finish it, e.g. because an audit append failed.
    ///
    /// An action failure is not an error: the report carries it and the run
    /// ends `Aborted`.
    pub fn execute(&self, run_id: RunId) -> TrustResult<ExecutionReport> {
        let _exclusive = self.execution.lock().map_err(|_| poisoned("execution"))?;
        let mut run = self.run(run_id)?;

        if !run.state.is_executable() {
            warn!(run_id = %run_id, state = %run.state, "execute requested for unapproved run");
            return Err(TrustError::PolicyViolation {
                action_index: None,
                reason: format!("run {} is {}, not approved", run_id, run.state),
            });
        }

        // Set once a snapshot is stored; a run that is still executable with
        // a snapshot was interrupted part way and must be restored, not rerun.
        if run.snapshot_taken {
            warn!(run_id = %run_id, "execute requested for interrupted run");
            return Err(TrustError::PolicyViolation {
                action_index: None,
                reason: format!("run {} was already started; restore it and resubmit", run_id),
            });
        }

        let gate = self.gate();
        let paths = run.plan.touched_paths();
        let captured = self
            .snapshots
            .capture(run_id, self.sandbox(), run.plan.environment, &paths);

        match captured {
            Ok(snapshot) => {
                run.snapshot_taken = true;
                self.store(run.clone())?;
                self.audit.append(&AuditEntry::for_run(
                    run_id,
                    AuditEventKind::SnapshotCaptured,
                    json!({
                        "environment": snapshot.environment,
                        "paths": snapshot.entries.keys().collect::<Vec<_>>(),
                    }),
                ))?;
            }
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "snapshot failed, aborting run");
                self.audit.append(&AuditEntry::for_run(
                    run_id,
                    AuditEventKind::SnapshotFailed,
                    json!({ "error_kind": err.kind(), "error": err.to_string() }),
                ))?;
                gate.abort(&mut run, &err)?;
                self.store(run)?;
                return Err(err);
            }
        }

        let report = self
            .executor
            .run(&run.plan, run.state, self.policy.as_ref(), self.audit.as_ref())?;
        gate.finish(&mut run, report.clone())?;
        self.store(run)?;
        Ok(report)
    }

    // ── Rollback ─────────────────────────────────────────────────────────────

    /// Return every path the run touched to its pre-run state.
    ///
    /// Works from the stored snapshot alone, so runs from an earlier process
    /// can be restored. Unknown run ids fail with `NotFound`.
    pub fn restore(&self, run_id: RunId) -> TrustResult<RestoreReport> {
        let _exclusive = self.execution.lock().map_err(|_| poisoned("execution"))?;

        let report = self.snapshots.restore(run_id, self.sandbox())?;
        self.audit.append(&AuditEntry::for_run(
            run_id,
            AuditEventKind::SnapshotRestored,
            json!({
                "rewritten": report.rewritten,
                "recreated_dirs": report.recreated_dirs,
                "removed": report.removed,
            }),
        ))?;

        info!(
            run_id = %run_id,
            rewritten = report.rewritten.len(),
            removed = report.removed.len(),
            "snapshot restored"
        );
        Ok(report)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn run(&self, run_id: RunId) -> TrustResult<RunRecord> {
        self.lock_runs()?
            .get(&run_id)
            .cloned()
            .ok_or_else(|| unknown_run(run_id))
    }

    /// Every run this layer has seen, oldest first.
    pub fn runs(&self) -> TrustResult<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self.lock_runs()?.values().cloned().collect();
        runs.sort_by_key(|r| r.plan.created_at);
        Ok(runs)
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn gate(&self) -> ApprovalGate<'_> {
        ApprovalGate::new(self.policy.as_ref(), self.audit.as_ref())
    }

    fn lock_runs(&self) -> TrustResult<MutexGuard<'_, HashMap<RunId, RunRecord>>> {
        self.runs.lock().map_err(|_| poisoned("run table"))
    }

    fn store(&self, run: RunRecord) -> TrustResult<()> {
        self.lock_runs()?.insert(run.run_id(), run);
        Ok(())
    }
}

fn unknown_run(run_id: RunId) -> TrustError {
    TrustError::NotFound {
        action_index: None,
        what: format!("run {}", run_id),
    }
}

fn poisoned(what: &str) -> TrustError {
    TrustError::LockPoisoned { what: what.to_string() }
}

// ── Tests ────────────────────────────────────────────────────────────────────
