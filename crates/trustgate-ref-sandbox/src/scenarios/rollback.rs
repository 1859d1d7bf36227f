//! Scenario 4: Execute, then roll back
//!
//! A Low-risk plan is auto-approved and executed against the seeded demo
//! files. Restoring the run's snapshot returns the workspace to exactly the
//! bytes and directories it had before.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use trustgate_contracts::{
    action::Environment,
    audit::AuditEventKind,
    error::{TrustError, TrustResult},
    policy::PolicyConfig,
    run::RunState,
    snapshot::RestoreReport,
};

use crate::seed::seed_demo_files;
use crate::wiring::Harness;

use super::print_audit_trail;

pub const PLAN: &str = "\
write releases/notes.md | Release v1.2 notes
append tmp/output.txt |  world
make_dir releases/2025-08-29
";

/// Relative path → file bytes, or `None` for a directory.
pub type Tree = BTreeMap<String, Option<Vec<u8>>>;

/// Walk `root` recursively.
pub fn read_tree(root: &Path) -> TrustResult<Tree> {
    fn walk(root: &Path, dir: &Path, out: &mut Tree) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let rel = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if path.is_dir() {
                out.insert(rel, None);
                walk(root, &path, out)?;
            } else {
                out.insert(rel, Some(fs::read(&path)?));
            }
        }
        Ok(())
    }

    let mut out = Tree::new();
    walk(root, root, &mut out).map_err(|e| TrustError::Io {
        path: root.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(out)
}

#[derive(Debug)]
pub struct Outcome {
    pub auto_approved: bool,
    pub changed_by_run: bool,
    pub identical_after_restore: bool,
    pub restore: RestoreReport,
    pub final_state: RunState,
    pub events: Vec<AuditEventKind>,
}

pub fn run() -> TrustResult<Outcome> {
    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;
    seed_demo_files(layer.sandbox(), Environment::Dev)?;
    let ws = layer.sandbox().workspace(Environment::Dev);
    let before = read_tree(&ws)?;

    let run = layer.submit(PLAN, Environment::Dev, Some("draft release notes"))?;
    layer.execute(run.run_id())?;
    let after_run = read_tree(&ws)?;

    let restore = layer.restore(run.run_id())?;
    let after_restore = read_tree(&ws)?;

    Ok(Outcome {
        auto_approved: run.state == RunState::AutoApproved,
        changed_by_run: after_run != before,
        identical_after_restore: after_restore == before,
        restore,
        final_state: layer.run(run.run_id())?.state,
        events: harness.audit.records()?.iter().map(|r| r.entry.event).collect(),
    })
}

pub fn run_scenario() -> TrustResult<()> {
    println!("=== Scenario 4: Execute, Then Roll Back ===");
    println!();

    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;
    seed_demo_files(layer.sandbox(), Environment::Dev)?;
    let ws = layer.sandbox().workspace(Environment::Dev);
    let before = read_tree(&ws)?;

    let run = layer.submit(PLAN, Environment::Dev, Some("draft release notes"))?;
    println!("  Tier:           {}", run.tier());
    println!("  State:          {}", run.state);

    let report = layer.execute(run.run_id())?;
    for outcome in &report.succeeded {
        println!("  Applied:        {}", outcome.summary);
    }
    println!();

    let restored = layer.restore(run.run_id())?;
    println!("  Restore:");
    println!("    rewritten:      {:?}", restored.rewritten);
    println!("    removed:        {:?}", restored.removed);
    println!("    recreated dirs: {:?}", restored.recreated_dirs);
    let identical = read_tree(&ws)? == before;
    println!(
        "  RESULT: workspace {} (expected identical)",
        if identical { "identical" } else { "DIFFERS" }
    );
    println!();

    print_audit_trail(&harness.audit)?;
    println!();
    Ok(())
}
