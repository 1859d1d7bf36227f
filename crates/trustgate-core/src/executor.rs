//! The sandbox executor: applies approved actions to the file tree.
//!
//! The executor enforces the run model:
//!
//!   Approved? → per action: Lock check → Allowed check → Apply → Audit
//!
//! It stops on the first failure. Already-applied actions stay applied and
//! are listed in the report; rollback is a separate, explicit restore.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::json;
use tracing::{debug, info, warn};

use trustgate_contracts::{
    action::{Action, ActionKind},
    audit::{AuditEntry, AuditEventKind},
    error::{TrustError, TrustResult},
    execution::{ActionFailure, ActionOutcome, ExecutionReport},
    plan::Plan,
    run::RunState,
};

use crate::sandbox::Sandbox;
use crate::traits::{AuditWriter, PolicyEngine};

/// Applies actions inside one sandbox.
#[derive(Debug, Clone)]
pub struct Executor {
    sandbox: Sandbox,
}

impl Executor {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Execute every action of `plan` in order.
    ///
    /// `state` must be `Approved` or `AutoApproved`; anything else is a
    /// `PolicyViolation` and nothing runs. Each action is re-checked against
    /// the live policy immediately before it runs, so a lock set mid-run
    /// stops the remainder.
    ///
    /// Every attempted action appends one `ActionExecuted` or `ActionFailed`
    /// record.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the run may not execute at all or an audit
    /// append fails. Action failures are reported in `ExecutionReport`.
    pub fn run(
        &self,
        plan: &Plan,
        state: RunState,
        policy: &dyn PolicyEngine,
        audit: &dyn AuditWriter,
    ) -> TrustResult<ExecutionReport> {
        if !state.is_executable() {
            warn!(run_id = %plan.run_id, state = %state, "refusing to execute unapproved run");
            return Err(TrustError::PolicyViolation {
                action_index: None,
                reason: format!("run {} is {}, not approved", plan.run_id, state),
            });
        }

        let mut report = ExecutionReport {
            run_id: plan.run_id,
            succeeded: Vec::with_capacity(plan.actions.len()),
            failure: None,
            skipped: 0,
        };

        for action in &plan.actions {
            let result = check_permitted(action, policy).and_then(|()| self.apply(action));

            match result {
                Ok(summary) => {
                    debug!(
                        run_id = %plan.run_id,
                        action_index = action.index,
                        kind = %action.kind,
                        "action applied"
                    );
                    audit.append(&AuditEntry::for_run(
                        plan.run_id,
                        AuditEventKind::ActionExecuted,
                        json!({
                            "action_index": action.index,
                            "kind": action.kind,
                            "raw": action.raw,
                            "summary": summary,
                        }),
                    ))?;
                    report.succeeded.push(ActionOutcome {
                        action_index: action.index,
                        kind: action.kind,
                        summary,
                    });
                }
                Err(err) => {
                    let err = err.at_action(action.index);
                    warn!(
                        run_id = %plan.run_id,
                        action_index = action.index,
                        kind = %action.kind,
                        error = %err,
                        "action failed, stopping run"
                    );
                    audit.append(&AuditEntry::for_run(
                        plan.run_id,
                        AuditEventKind::ActionFailed,
                        json!({
                            "action_index": action.index,
                            "kind": action.kind,
                            "raw": action.raw,
                            "error_kind": err.kind(),
                            "error": err.to_string(),
                            "applied_before_failure": report
                                .succeeded
                                .iter()
                                .map(|o| o.action_index)
                                .collect::<Vec<_>>(),
                        }),
                    ))?;
                    report.failure = Some(ActionFailure::from_error(action.index, &err));
                    report.skipped = plan.actions.len() - action.index - 1;
                    break;
                }
            }
        }

        info!(
            run_id = %plan.run_id,
            applied = report.succeeded.len(),
            failed = report.failure.is_some(),
            "plan execution finished"
        );
        Ok(report)
    }

    /// Apply a single action and return a one-line summary of what changed.
    pub fn apply(&self, action: &Action) -> TrustResult<String> {
        let env = action.environment;
        let idx = action.index;
        let target = self.sandbox.resolve(env, action.primary_path())?;
        let rel = action.primary_path();

        match action.kind {
            ActionKind::Write => {
                let content = action.content.as_deref().unwrap_or_default();
                ensure_parent(&target, idx)?;
                fs::write(&target, content).map_err(|e| exec_error(idx, &e))?;
                Ok(format!("wrote {} ({} bytes)", rel, content.len()))
            }

            ActionKind::Append => {
                let content = action.content.as_deref().unwrap_or_default();
                ensure_parent(&target, idx)?;
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&target)
                    .map_err(|e| exec_error(idx, &e))?;
                file.write_all(content.as_bytes())
                    .map_err(|e| exec_error(idx, &e))?;
                Ok(format!("appended {} bytes to {}", content.len(), rel))
            }

            ActionKind::DeleteFile => {
                let meta = match fs::symlink_metadata(&target) {
                    Ok(meta) => meta,
                    Err(_) => {
                        return Err(TrustError::NotFound {
                            action_index: Some(idx),
                            what: rel.to_string(),
                        })
                    }
                };
                if meta.is_dir() {
                    return Err(TrustError::Execution {
                        action_index: idx,
                        reason: format!("refusing to delete directory '{}'", rel),
                    });
                }
                fs::remove_file(&target).map_err(|e| exec_error(idx, &e))?;
                Ok(format!("deleted {}", rel))
            }

            ActionKind::Move => {
                let dest_rel = action.destination().unwrap_or_default();
                let dest = self.sandbox.resolve(env, dest_rel)?;
                if fs::symlink_metadata(&target).is_err() {
                    return Err(TrustError::NotFound {
                        action_index: Some(idx),
                        what: rel.to_string(),
                    });
                }
                if fs::symlink_metadata(&dest).is_ok() {
                    return Err(TrustError::Conflict {
                        action_index: Some(idx),
                        path: dest_rel.to_string(),
                    });
                }
                ensure_parent(&dest, idx)?;
                fs::rename(&target, &dest).map_err(|e| exec_error(idx, &e))?;
                Ok(format!("moved {} -> {}", rel, dest_rel))
            }

            ActionKind::MakeDir => {
                if target.is_dir() {
                    return Ok(format!("directory {} already exists", rel));
                }
                if fs::symlink_metadata(&target).is_ok() {
                    return Err(TrustError::Conflict {
                        action_index: Some(idx),
                        path: rel.to_string(),
                    });
                }
                fs::create_dir_all(&target).map_err(|e| exec_error(idx, &e))?;
                Ok(format!("created directory {}", rel))
            }
        }
    }
}

/// The live-policy gate every action passes immediately before it runs.
fn check_permitted(action: &Action, policy: &dyn PolicyEngine) -> TrustResult<()> {
    if !policy.is_writable(action.environment) {
        return Err(TrustError::PolicyViolation {
            action_index: Some(action.index),
            reason: format!("environment '{}' is locked", action.environment),
        });
    }
    if !policy.is_allowed(action.kind) {
        return Err(TrustError::PolicyViolation {
            action_index: Some(action.index),
            reason: format!("action '{}' is not in allowed_actions", action.kind),
        });
    }
    Ok(())
}

fn ensure_parent(path: &Path, action_index: usize) -> TrustResult<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| exec_error(action_index, &e)),
        None => Ok(()),
    }
}

fn exec_error(action_index: usize, err: &std::io::Error) -> TrustError {
    TrustError::Execution {
        action_index,
        reason: err.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::{tempdir, TempDir};

    use trustgate_contracts::{
        action::Environment,
        audit::{AuditEntry, AuditEventKind},
        error::{TrustError, TrustResult},
        plan::Plan,
        policy::PolicyConfig,
        run::RunState,
    };

    use crate::parser::parse_plan;
    use crate::sandbox::Sandbox;
    use crate::traits::{AuditWriter, PolicyEngine};

    use super::Executor;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    struct FixedPolicy(Arc<PolicyConfig>);

    impl PolicyEngine for FixedPolicy {
        fn current(&self) -> Arc<PolicyConfig> {
            Arc::clone(&self.0)
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl AuditWriter for RecordingAudit {
        fn append(&self, entry: &AuditEntry) -> TrustResult<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn setup() -> (TempDir, Executor) {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();
        (dir, Executor::new(sandbox))
    }

    fn unlocked() -> FixedPolicy {
        FixedPolicy(Arc::new(PolicyConfig { prod_locked: false, ..PolicyConfig::default() }))
    }

    fn plan(text: &str, env: Environment) -> Plan {
        Plan::new(env, parse_plan(text, env).unwrap(), None)
    }

    fn ws(exec: &Executor, env: Environment) -> std::path::PathBuf {
        exec.sandbox().workspace(env)
    }

    // ── Per-action semantics ─────────────────────────────────────────────────

    #[test]
    fn write_creates_parents_and_overwrites() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let p = plan("write deep/nested/a.txt | one\nwrite deep/nested/a.txt | two", Environment::Dev);

        let report = exec.run(&p, RunState::AutoApproved, &unlocked(), &audit).unwrap();

        assert!(report.is_success());
        let content = std::fs::read_to_string(ws(&exec, Environment::Dev).join("deep/nested/a.txt")).unwrap();
        assert_eq!(content, "two");
        assert_eq!(audit.entries.lock().unwrap().len(), 2);
    }

    #[test]
    fn append_creates_then_extends() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let p = plan("append log.txt | a\nappend log.txt | b", Environment::Dev);

        exec.run(&p, RunState::Approved, &unlocked(), &audit).unwrap();

        let content = std::fs::read_to_string(ws(&exec, Environment::Dev).join("log.txt")).unwrap();
        assert_eq!(content, "ab");
    }

    #[test]
    fn delete_missing_file_is_not_found() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let p = plan("delete_file ghost.txt", Environment::Dev);

        let report = exec.run(&p, RunState::Approved, &unlocked(), &audit).unwrap();

        let failure = report.failure.unwrap();
        assert_eq!(failure.action_index, 0);
        assert_eq!(failure.error_kind, "NotFoundError");
        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries[0].event, AuditEventKind::ActionFailed);
    }

    #[test]
    fn delete_refuses_directories() {
        let (_dir, exec) = setup();
        std::fs::create_dir_all(ws(&exec, Environment::Dev).join("keep")).unwrap();
        let err = exec.apply(&plan("delete_file keep", Environment::Dev).actions[0]).unwrap_err();
        assert!(matches!(err, TrustError::Execution { .. }));
        assert!(ws(&exec, Environment::Dev).join("keep").is_dir());
    }

    #[test]
    fn move_onto_existing_destination_conflicts_and_leaves_source() {
        let (_dir, exec) = setup();
        let root = ws(&exec, Environment::Dev);
        std::fs::create_dir_all(root.join("tmp")).unwrap();
        std::fs::write(root.join("tmp/a.txt"), "A").unwrap();
        std::fs::write(root.join("tmp/b.txt"), "B").unwrap();

        let err = exec.apply(&plan("move tmp/a.txt tmp/b.txt", Environment::Dev).actions[0]).unwrap_err();

        assert!(matches!(err, TrustError::Conflict { action_index: Some(0), .. }));
        assert_eq!(std::fs::read_to_string(root.join("tmp/a.txt")).unwrap(), "A");
        assert_eq!(std::fs::read_to_string(root.join("tmp/b.txt")).unwrap(), "B");
    }

    #[test]
    fn move_missing_source_is_not_found() {
        let (_dir, exec) = setup();
        let err = exec.apply(&plan("move nope.txt there.txt", Environment::Dev).actions[0]).unwrap_err();
        assert!(matches!(err, TrustError::NotFound { .. }));
    }

    #[test]
    fn move_relocates_into_new_directory() {
        let (_dir, exec) = setup();
        let root = ws(&exec, Environment::Dev);
        std::fs::write(root.join("a.txt"), "payload").unwrap();

        exec.apply(&plan("move a.txt reports/a.txt", Environment::Dev).actions[0]).unwrap();

        assert!(!root.join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(root.join("reports/a.txt")).unwrap(), "payload");
    }

    #[test]
    fn make_dir_is_idempotent() {
        let (_dir, exec) = setup();
        let action = &plan("make_dir releases/2025", Environment::Dev).actions[0];
        exec.apply(action).unwrap();
        let second = exec.apply(action).unwrap();
        assert!(second.contains("already exists"));
        assert!(ws(&exec, Environment::Dev).join("releases/2025").is_dir());
    }

    #[test]
    fn make_dir_over_file_conflicts() {
        let (_dir, exec) = setup();
        std::fs::write(ws(&exec, Environment::Dev).join("x"), "file").unwrap();
        let err = exec.apply(&plan("make_dir x", Environment::Dev).actions[0]).unwrap_err();
        assert!(matches!(err, TrustError::Conflict { .. }));
    }

    // ── Run-level behaviour ──────────────────────────────────────────────────

    #[test]
    fn stops_at_first_failure_and_keeps_prior_work() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let p = plan(
            "write one.txt | 1\ndelete_file missing.txt\nwrite three.txt | 3",
            Environment::Dev,
        );

        let report = exec.run(&p, RunState::Approved, &unlocked(), &audit).unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failure.as_ref().unwrap().action_index, 1);
        assert_eq!(report.skipped, 1);
        let root = ws(&exec, Environment::Dev);
        assert!(root.join("one.txt").exists());
        assert!(!root.join("three.txt").exists());

        let kinds: Vec<AuditEventKind> =
            audit.entries.lock().unwrap().iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![AuditEventKind::ActionExecuted, AuditEventKind::ActionFailed]);
    }

    #[test]
    fn unapproved_run_never_touches_the_tree() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let p = plan("write a.txt | hi", Environment::Dev);

        for state in [RunState::PendingApproval, RunState::Rejected, RunState::Scored] {
            let err = exec.run(&p, state, &unlocked(), &audit).unwrap_err();
            assert!(matches!(err, TrustError::PolicyViolation { .. }));
        }
        assert!(!ws(&exec, Environment::Dev).join("a.txt").exists());
        assert!(audit.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn locked_environment_blocks_even_an_approved_run() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let locked = FixedPolicy(Arc::new(PolicyConfig::default()));
        let p = plan("write a.txt | hi", Environment::Prod);

        let report = exec.run(&p, RunState::Approved, &locked, &audit).unwrap();

        assert_eq!(report.failure.unwrap().error_kind, "PolicyViolationError");
        assert!(!ws(&exec, Environment::Prod).join("a.txt").exists());
    }

    #[test]
    fn disallowed_kind_is_blocked_at_execution() {
        let (_dir, exec) = setup();
        let audit = RecordingAudit::default();
        let policy = FixedPolicy(Arc::new(PolicyConfig {
            allowed_actions: vec![trustgate_contracts::action::ActionKind::Write],
            ..PolicyConfig::default()
        }));
        let p = plan("write a.txt | ok\nmake_dir d", Environment::Dev);

        let report = exec.run(&p, RunState::Approved, &policy, &audit).unwrap();

        assert_eq!(report.succeeded.len(), 1);
        let failure = report.failure.unwrap();
        assert_eq!(failure.action_index, 1);
        assert!(failure.message.contains("allowed_actions"));
    }
}
