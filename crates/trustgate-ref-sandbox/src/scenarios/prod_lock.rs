//! Scenario 2: Locked production environment and live policy reload
//!
//! A Medium-risk write against `prod` is parked behind the `prod_locked`
//! flag. Approval is refused while the lock stands, whatever the tier.
//!
//!   Step 1: submit              → PendingApproval (policy block)
//!   Step 2: approve             → PolicyViolationError, ApprovalDenied recorded
//!   Step 3: reload (malformed)  → ConfigError, previous policy stays active
//!   Step 4: reload (unlocked)   → ConfigReloaded
//!   Step 5: approve + execute   → Executed

use std::fs;

use serde_json::Value;

use trustgate_contracts::{
    action::Environment,
    audit::AuditEventKind,
    error::{TrustError, TrustResult},
    policy::PolicyConfig,
    risk::RiskTier,
    run::{PendingReason, RunState},
};
use trustgate_core::traits::PolicyEngine;

use crate::wiring::Harness;

use super::print_audit_trail;

pub const PLAN: &str = "write prod/config.yaml | secrets";

/// Missing `allowed_actions`, and `prod_locked` is not a boolean.
const MALFORMED_POLICY: &str = "prod_locked = \"no\"\nhigh_risk_keywords = []\nmed_risk_hints = []\n";

fn unlocked_policy() -> TrustResult<Value> {
    let config = PolicyConfig {
        prod_locked: false,
        ..PolicyConfig::default()
    };
    serde_json::to_value(config).map_err(|e| TrustError::Config {
        problems: vec![e.to_string()],
    })
}

#[derive(Debug)]
pub struct Outcome {
    pub tier: RiskTier,
    pub pending: Option<PendingReason>,
    pub locked_approval: TrustError,
    pub state_while_locked: RunState,
    pub malformed_reload: TrustError,
    pub still_locked_after_bad_reload: bool,
    pub final_state: RunState,
    pub written: Option<String>,
    pub events: Vec<AuditEventKind>,
    pub chain_valid: bool,
}

pub fn run() -> TrustResult<Outcome> {
    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;

    let run = layer.submit(PLAN, Environment::Prod, None)?;
    let locked_approval = match layer.approve(run.run_id(), "alice", "urgent fix") {
        Err(err) => err,
        Ok(state) => {
            return Err(TrustError::InvalidTransition {
                run_id: run.run_id().to_string(),
                from: RunState::PendingApproval,
                to: state,
            })
        }
    };
    let state_while_locked = layer.run(run.run_id())?.state;

    let malformed_reload = match harness.policy.reload_toml_str(MALFORMED_POLICY) {
        Err(err) => err,
        Ok(_) => {
            return Err(TrustError::Config {
                problems: vec!["malformed policy was accepted".to_string()],
            })
        }
    };
    let still_locked_after_bad_reload = harness.policy.current().prod_locked;

    harness.policy.reload(&unlocked_policy()?)?;
    layer.approve(run.run_id(), "alice", "lock lifted for the release window")?;
    layer.execute(run.run_id())?;

    let target = layer.sandbox().workspace(Environment::Prod).join("prod/config.yaml");
    Ok(Outcome {
        tier: run.tier(),
        pending: run.pending.clone(),
        locked_approval,
        state_while_locked,
        malformed_reload,
        still_locked_after_bad_reload,
        final_state: layer.run(run.run_id())?.state,
        written: fs::read_to_string(target).ok(),
        events: harness.audit.records()?.iter().map(|r| r.entry.event).collect(),
        chain_valid: harness.audit.verify_integrity()?.is_valid(),
    })
}

pub fn run_scenario() -> TrustResult<()> {
    println!("=== Scenario 2: Locked Production and Live Policy Reload ===");
    println!();

    let harness = Harness::new(PolicyConfig::default())?;
    let layer = &harness.layer;

    println!("  Plan (env=prod): {}", PLAN);
    let run = layer.submit(PLAN, Environment::Prod, None)?;
    println!("  Tier:           {}", run.tier());
    println!("  State:          {}", run.state);
    if let Some(PendingReason::PolicyBlock { reason }) = &run.pending {
        println!("  Blocked:        {}", reason);
    }
    println!();

    println!("  Step 2: approve while prod is locked");
    match layer.approve(run.run_id(), "alice", "urgent fix") {
        Err(err) => println!("  RESULT: {} (expected): {}", err.kind(), err),
        Ok(state) => println!("  UNEXPECTED: approval succeeded ({})", state),
    }
    println!();

    println!("  Step 3: reload a malformed policy");
    match harness.policy.reload_toml_str(MALFORMED_POLICY) {
        Err(TrustError::Config { problems }) => {
            println!("  RESULT: ConfigError (expected), {} problem(s):", problems.len());
            for problem in problems {
                println!("    - {}", problem);
            }
        }
        Err(other) => println!("  UNEXPECTED: {}", other),
        Ok(_) => println!("  UNEXPECTED: malformed policy accepted"),
    }
    println!("  prod_locked still: {}", harness.policy.current().prod_locked);
    println!();

    println!("  Step 4: reload with prod unlocked");
    harness.policy.reload(&unlocked_policy()?)?;
    println!("  prod_locked now:  {}", harness.policy.current().prod_locked);
    println!();

    println!("  Step 5: approve and execute");
    layer.approve(run.run_id(), "alice", "lock lifted for the release window")?;
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
