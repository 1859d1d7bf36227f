//! Scenario 3: Move onto an existing file
//!
//! `move a.txt b.txt` when `b.txt` already exists is refused at execution
//! time with a `ConflictError`. Nothing is overwritten, the run is aborted,
//! and the failure is in the audit trail.

use std::fs;

use trustgate_contracts::{
    action::Environment,
    audit::AuditEventKind,
    error::{TrustError, TrustResult},
    execution::ExecutionReport,
    policy::PolicyConfig,
    run::RunState,
};

use crate::wiring::Harness;

use super::print_audit_trail;

pub const PLAN: &str = "move a.txt b.txt";

#[derive(Debug)]
pub struct Outcome {
    pub report: ExecutionReport,
    pub final_state: RunState,
    pub source: Option<String>,
    pub target: Option<String>,
    pub events: Vec<AuditEventKind>,
    pub chain_valid: bool,
}

fn prepare(harness: &Harness) -> TrustResult<()> {
    let ws = harness.layer.sandbox().workspace(Environment::Dev);
    for (name, contents) in [("a.txt", "from a"), ("b.txt", "already here")] {
        let path = ws.join(name);
        fs::write(&path, contents).map_err(|e| TrustError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

pub fn run() -> TrustResult<Outcome> {
    let harness = Harness::new(PolicyConfig::default())?;
    prepare(&harness)?;
    let layer = &harness.layer;

    let run = layer.submit(PLAN, Environment::Dev, None)?;
    layer.approve(run.run_id(), "alice", "rename")?;
    let report = layer.execute(run.run_id())?;

    let ws = layer.sandbox().workspace(Environment::Dev);
    Ok(Outcome {
        report,
        final_state: layer.run(run.run_id())?.state,
        source: fs::read_to_string(ws.join("a.txt")).ok(),
        target: fs::read_to_string(ws.join("b.txt")).ok(),
        events: harness.audit.records()?.iter().map(|r| r.entry.event).collect(),
        chain_valid: harness.audit.verify_integrity()?.is_valid(),
    })
}

pub fn run_scenario() -> TrustResult<()> {
    println!("=== Scenario 3: Move Onto an Existing File ===");
    println!();

    let harness = Harness::new(PolicyConfig::default())?;
    prepare(&harness)?;
    let layer = &harness.layer;

    println!("  Workspace: a.txt, b.txt");
    println!("  Plan (env=dev): {}", PLAN);
    let run = layer.submit(PLAN, Environment::Dev, None)?;
    println!("  Tier:           {}", run.tier());
    layer.approve(run.run_id(), "alice", "rename")?;
    println!("  [alice approves]");

    let report = layer.execute(run.run_id())?;
    match &report.failure {
        Some(failure) => println!(
            "  RESULT: {} on action {} (expected): {}",
            failure.error_kind, failure.action_index, failure.message
        ),
        None => println!("  UNEXPECTED: move succeeded"),
    }
    println!("  Run state:      {}", layer.run(run.run_id())?.state);
    println!("  a.txt and b.txt are unchanged.");
    println!();

    print_audit_trail(&harness.audit)?;
    println!();
    Ok(())
}
