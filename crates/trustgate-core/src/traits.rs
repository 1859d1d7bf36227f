//! Core trait definitions for the TRUSTGATE pipeline.
//!
//! These four traits define the trust boundary:
//!
//! - `PolicyEngine`  : live policy (environment locks, allowed kinds)
//! - `RiskScorer`    : classifies each action into a risk tier
//! - `AuditWriter`   : trusted sink, records every event immutably
//! - `SnapshotStore` : captures and restores pre-run file state
//!
//! `TrustLayer` wires them together in trust order. The executor never
//! touches the file tree unless the gate has approved the run and a
//! snapshot has been captured.

use std::sync::Arc;

use trustgate_contracts::{
    action::{Action, ActionKind, Environment},
    audit::AuditEntry,
    error::TrustResult,
    plan::RunId,
    policy::PolicyConfig,
    risk::RiskAssessment,
    snapshot::{RestoreReport, Snapshot},
};

use crate::sandbox::Sandbox;

/// The live policy the gate and executor consult.
///
/// Implementations must never expose a half-applied config: `current()`
/// returns either the old document or the new one.
pub trait PolicyEngine: Send + Sync {
    /// The active config. Cheap; callers may hold it for a whole decision.
    fn current(&self) -> Arc<PolicyConfig>;

    /// Return false if `environment` is locked. Independent of risk.
    fn is_writable(&self, environment: Environment) -> bool {
        !self.current().is_locked(environment)
    }

    /// Return true if `kind` is in the active `allowed_actions`.
    fn is_allowed(&self, kind: ActionKind) -> bool {
        self.current().is_allowed(kind)
    }
}

/// Assigns a risk tier to one action under a given policy.
///
/// Implementations must be deterministic and must record every rule that
/// fired, not just the first.
pub trait RiskScorer: Send + Sync {
    fn score(&self, action: &Action, policy: &PolicyConfig) -> RiskAssessment;
}

/// The audit writer: the immutable event record.
///
/// Every state-changing event produces exactly one `AuditEntry`. A failed
/// append is fatal for the operation that produced it.
pub trait AuditWriter: Send + Sync {
    /// Append one entry. Implementations must never modify earlier entries.
    fn append(&self, entry: &AuditEntry) -> TrustResult<()>;
}

/// Pre-execution capture and rollback of workspace paths.
pub trait SnapshotStore: Send + Sync {
    /// Capture every path in `paths` (relative to the environment's
    /// workspace) plus their ancestors, then persist the snapshot under
    /// `run_id`. Either the whole capture succeeds or nothing is stored.
    fn capture(
        &self,
        run_id: RunId,
        sandbox: &Sandbox,
        environment: Environment,
        paths: &[&str],
    ) -> TrustResult<Snapshot>;

    /// Return every captured path to its pre-run state. Idempotent.
    fn restore(&self, run_id: RunId, sandbox: &Sandbox) -> TrustResult<RestoreReport>;

    /// Load a stored snapshot.
    fn load(&self, run_id: RunId) -> TrustResult<Snapshot>;

    /// Delete a stored snapshot.
    fn prune(&self, run_id: RunId) -> TrustResult<()>;
}
