//! Scenario 1: Mixed-risk plan with human approval
//!
//! A Low-risk write and a Medium-risk delete are submitted together against
//! `dev`. The plan aggregates to Medium, waits for a human, and runs once
//! "alice" approves it.
//!
//!   submit  → Scored (Medium) → PendingApproval
//!   approve → Approved
//!   execute → Snapshot → write a.txt, delete old/legacy.sql → Executed

use std::fs;

use trustgate_contracts::{
    action::Environment,
    audit::AuditEventKind,
    error::TrustResult,
    policy::PolicyConfig,
    risk::RiskTier,
    run::RunState,
};

use crate::seed::seed_demo_files;
use crate::wiring::Harness;

use super::print_audit_trail;

pub const PLAN: &str = "write a.txt | hello\ndelete_file old/legacy.sql";

/// What happened, for assertions.
#[derive(Debug)]
pub struct Outcome {
    pub tier: RiskTier,
    pub state_after_submit: RunState,
    pub final_state: RunState,
    pub written: Option<String>,
    pub legacy_exists: bool,
    pub events: Vec<AuditEventKind>,
    pub chain_valid: bool,
}

pub fn run() -> TrustResult<Outcome> {
    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;
    seed_demo_files(layer.sandbox(), Environment::Dev)?;

    let run = layer.submit(PLAN, Environment::Dev, Some("tidy the dev workspace"))?;
    let state_after_submit = run.state;
    layer.approve(run.run_id(), "alice", "legacy SQL is unused")?;
    layer.execute(run.run_id())?;

    let ws = layer.sandbox().workspace(Environment::Dev);
    Ok(Outcome {
        tier: run.tier(),
        state_after_submit,
        final_state: layer.run(run.run_id())?.state,
        written: fs::read_to_string(ws.join("a.txt")).ok(),
        legacy_exists: ws.join("old/legacy.sql").exists(),
        events: harness.audit.records()?.iter().map(|r| r.entry.event).collect(),
        chain_valid: harness.audit.verify_integrity()?.is_valid(),
    })
}

pub fn run_scenario() -> TrustResult<()> {
    println!("=== Scenario 1: Mixed-Risk Plan With Human Approval ===");
    println!();

    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;
    seed_demo_files(layer.sandbox(), Environment::Dev)?;

    println!("  Plan (env=dev):");
    for line in PLAN.lines() {
        println!("    {}", line);
    }
    println!();

    let run = layer.submit(PLAN, Environment::Dev, Some("tidy the dev workspace"))?;
    if let Some(assessment) = &run.assessment {
        for scored in &assessment.actions {
            println!("  Action {}: {}", scored.action_index, scored.tier);
        }
    }
    println!("  Aggregate tier: {}", run.tier());
    println!("  State:          {}", run.state);
    println!();

    println!("  [alice approves]");
    let state = layer.approve(run.run_id(), "alice", "legacy SQL is unused")?;
    println!("  State:          {}", state);

    let report = layer.execute(run.run_id())?;
    for outcome in &report.succeeded {
        println!("  Applied:        {}", outcome.summary);
    }
    println!("  RESULT: {} (expected)", layer.run(run.run_id())?.state);
    println!();

    print_audit_trail(&harness.audit)?;
    println!();
    Ok(())
}
