//! Assembling a `TrustLayer` from the concrete crates.
//!
//! Two set-ups are provided:
//!
//! - [`Harness`]: a throwaway sandbox with an in-memory audit chain, used by
//!   the scenarios and tests.
//! - [`Station`]: a persistent sandbox root with a JSONL audit log and a
//!   snapshot directory under `<root>/.trustgate/`, used by the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use trustgate_audit::{FileAuditWriter, InMemoryAuditWriter};
use trustgate_contracts::{
    error::{TrustError, TrustResult},
    policy::PolicyConfig,
};
use trustgate_core::{traits::AuditWriter, Sandbox, TrustLayer};
use trustgate_policy::{KeywordRiskScorer, LivePolicyEngine};
use trustgate_snapshot::DirSnapshotStore;

/// Directory under the sandbox root holding trust-layer state.
pub const STATE_DIR: &str = ".trustgate";

pub fn audit_log_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("audit.jsonl")
}

pub fn snapshot_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("snapshots")
}

fn assemble(
    sandbox: Sandbox,
    policy: Arc<LivePolicyEngine>,
    audit: Arc<dyn AuditWriter>,
    snapshots: DirSnapshotStore,
) -> TrustLayer {
    TrustLayer::new(sandbox, policy, Box::new(KeywordRiskScorer::new()), audit, Box::new(snapshots))
}

// ── In-memory harness ─────────────────────────────────────────────────────────

/// A trust layer over a temporary directory that is deleted on drop.
pub struct Harness {
    pub layer: TrustLayer,
    pub policy: Arc<LivePolicyEngine>,
    pub audit: InMemoryAuditWriter,
    dir: TempDir,
}

impl Harness {
    pub fn new(config: PolicyConfig) -> TrustResult<Self> {
        let dir = tempfile::tempdir().map_err(|e| TrustError::Io {
            path: "<tempdir>".to_string(),
            reason: e.to_string(),
        })?;
        let sandbox = Sandbox::open(dir.path().join("sandbox"))?;
        let snapshots = DirSnapshotStore::open(dir.path().join("snapshots"))?;

        let audit = InMemoryAuditWriter::new();
        let shared: Arc<dyn AuditWriter> = Arc::new(audit.clone());
        let policy = Arc::new(LivePolicyEngine::new(config, Arc::clone(&shared)));
        let layer = assemble(sandbox, Arc::clone(&policy), shared, snapshots);

        Ok(Self { layer, policy, audit, dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

// ── Persistent station ────────────────────────────────────────────────────────

/// A trust layer over a sandbox root that survives the process.
pub struct Station {
    pub layer: TrustLayer,
    pub policy: Arc<LivePolicyEngine>,
    pub snapshots: DirSnapshotStore,
    pub audit_path: PathBuf,
}

impl Station {
    pub fn open(root: &Path, config: PolicyConfig) -> TrustResult<Self> {
        let sandbox = Sandbox::open(root)?;
        let audit_path = audit_log_path(sandbox.root());
        let snapshots = DirSnapshotStore::open(snapshot_dir(sandbox.root()))?;

        let audit: Arc<dyn AuditWriter> = Arc::new(FileAuditWriter::open(&audit_path)?);
        let policy = Arc::new(LivePolicyEngine::new(config, Arc::clone(&audit)));
        let layer = assemble(sandbox, Arc::clone(&policy), audit, snapshots.clone());

        Ok(Self { layer, policy, snapshots, audit_path })
    }
}

#[cfg(test)]
mod tests {
    use trustgate_contracts::{action::Environment, run::RunState};

    use super::*;

    #[test]
    fn station_persists_audit_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first_run = {
            let station = Station::open(dir.path(), PolicyConfig::default()).unwrap();
            let run = station
                .layer
                .submit("write notes.md | hi", Environment::Dev, None)
                .unwrap();
            station.layer.execute(run.run_id()).unwrap();
            run.run_id()
        };

        let station = Station::open(dir.path(), PolicyConfig::default()).unwrap();
        // Restore works from the stored snapshot even though this process
        // never saw the run.
        station.layer.restore(first_run).unwrap();
        assert!(!dir.path().join("dev/notes.md").exists());

        let report = FileAuditWriter::verify_file(&station.audit_path).unwrap();
        assert!(report.is_valid());
        assert!(report.length >= 6);
        assert_eq!(station.snapshots.list().unwrap().len(), 1);
    }

    #[test]
    fn harness_shares_one_chain_between_policy_and_layer() {
        let harness = Harness::new(PolicyConfig::default()).unwrap();
        let run = harness
            .layer
            .submit("make_dir build", Environment::Dev, None)
            .unwrap();
        assert_eq!(run.state, RunState::AutoApproved);
        harness
            .policy
            .reload_toml_str("prod_locked = false\nallowed_actions = []\nhigh_risk_keywords = []\nmed_risk_hints = []\n")
            .unwrap();

        let records = harness.audit.records().unwrap();
        assert_eq!(records.len(), 4);
        assert!(harness.audit.verify_integrity().unwrap().is_valid());
    }
}
