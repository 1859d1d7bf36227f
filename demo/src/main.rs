//! TRUSTGATE command-line front end.
//!
//! Submits agent plans to a trust layer rooted at `--root`, keeping the
//! audit log and snapshots under `<root>/.trustgate/`.
//!
//! Usage:
//!   cargo run -p demo -- seed --env dev
//!   cargo run -p demo -- run plan.txt --env dev --approve alice
//!   cargo run -p demo -- restore <run-id>
//!   cargo run -p demo -- verify-log
//!   cargo run -p demo -- scenarios

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trustgate_audit::FileAuditWriter;
use trustgate_contracts::{
    action::Environment,
    error::{TrustError, TrustResult},
    plan::RunId,
    run::{PendingReason, RunRecord, RunState},
};
use trustgate_core::{render_risk_summary, traits::SnapshotStore};
use trustgate_policy::config::load_or_default;
use trustgate_ref_sandbox::{scenarios, seed_demo_files, wiring::audit_log_path, Station};

// ── CLI definition ────────────────────────────────────────────────────────────

/// TRUSTGATE: a trust layer for AI agent file-operation plans.
#[derive(Parser)]
#[command(
    name = "trustgate",
    about = "Score, approve, execute and roll back agent file-operation plans",
    long_about = "Parses agent plans, scores their risk against a live policy, holds risky\n\
                  or locked plans for human approval, snapshots before executing, and\n\
                  records every decision in a SHA-256 checksum-chained audit log."
)]
struct Cli {
    /// Sandbox root holding the dev/staging/prod workspaces.
    #[arg(long, global = true, default_value = "sandbox")]
    root: PathBuf,

    /// Policy document (TOML, or JSON by extension). Defaults to the built-in policy.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a plan; execute it if auto-approved or approved with --approve.
    Run {
        /// Plan file. Reads stdin when omitted.
        plan: Option<PathBuf>,
        #[arg(long, default_value = "dev")]
        env: Environment,
        /// Free-text description stored with the plan.
        #[arg(long)]
        task: Option<String>,
        /// Approve a pending plan as this person.
        #[arg(long)]
        approve: Option<String>,
        /// Rationale recorded with the approval.
        #[arg(long, default_value = "")]
        reason: String,
        /// Write the Markdown risk report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Restore the pre-run snapshot of a run.
    Restore { run_id: RunId },
    /// List stored snapshots, or prune one.
    Snapshots {
        #[arg(long)]
        prune: Option<RunId>,
    },
    /// Verify the audit log's checksum chain.
    VerifyLog,
    /// Export the audit log with its verification report as JSON.
    Export {
        /// Output file. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create the demo files in an environment's workspace.
    Seed {
        #[arg(long, default_value = "dev")]
        env: Environment,
    },
    /// Run every reference scenario in throwaway sandboxes.
    Scenarios,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    match execute(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("trustgate: {} ({})", e, e.kind());
            std::process::exit(1);
        }
    }
}

// `Ok(code)` is the process exit status: 0 done, 2 refused or not executed.
type Exit = TrustResult<i32>;

fn open_station(root: &Path, policy: Option<&Path>) -> TrustResult<Station> {
    let config = load_or_default(policy)?;
    info!(root = %root.display(), policy = ?policy, "opening sandbox");
    Station::open(root, config)
}

/// Run one parsed command line. Commands that only read the audit log, and
/// the self-contained scenarios, never open the station.
fn execute(cli: Cli) -> Exit {
    let Cli { root, policy, command } = cli;
    let station = || open_station(&root, policy.as_deref());

    match command {
        Command::Run { plan, env, task, approve, reason, report } => run_plan(
            &station()?,
            plan.as_deref(),
            env,
            task.as_deref(),
            approve.as_deref(),
            &reason,
            report.as_deref(),
        ),
        Command::Restore { run_id } => restore(&station()?, run_id),
        Command::Snapshots { prune } => snapshots(&station()?, prune),
        Command::Seed { env } => seed(&station()?, env),
        Command::VerifyLog => verify_log(&root),
        Command::Export { out } => export(&root, out.as_deref()),
        Command::Scenarios => scenarios::run_all().map(|()| 0),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_plan(
    station: &Station,
    plan: Option<&Path>,
    env: Environment,
    task: Option<&str>,
    approver: Option<&str>,
    reason: &str,
    report: Option<&Path>,
) -> Exit {
    let text = read_plan(plan)?;
    let layer = &station.layer;
    let run = layer.submit(&text, env, task)?;
    let run_id = run.run_id();

    println!("Run {} ({} actions, env={})", run_id, run.plan.actions.len(), env);
    println!("Risk tier: {}", run.tier());

    if run.state == RunState::PendingApproval {
        match &run.pending {
            Some(PendingReason::PolicyBlock { reason }) => println!("Blocked by policy: {}", reason),
            Some(PendingReason::Risk { tier }) => println!("{} risk: human approval required", tier),
            None => {}
        }
        let Some(approver) = approver else {
            write_report(layer.run(run_id)?, report)?;
            println!("Not executed. Re-run with --approve <name> to approve.");
            return Ok(2);
        };
        if let Err(err) = layer.approve(run_id, approver, reason) {
            write_report(layer.run(run_id)?, report)?;
            println!("Approval refused: {} ({})", err, err.kind());
            return Ok(2);
        }
        println!("Approved by {}", approver);
    } else {
        println!("Auto-approved");
    }

    let outcome = layer.execute(run_id)?;
    for applied in &outcome.succeeded {
        println!("  [{}] {}", applied.action_index, applied.summary);
    }
    if let Some(failure) = &outcome.failure {
        println!(
            "  [{}] FAILED {}: {} ({} not attempted)",
            failure.action_index, failure.error_kind, failure.message, outcome.skipped
        );
    }

    let finished = layer.run(run_id)?;
    println!("State: {}", finished.state);
    if finished.snapshot_taken {
        println!("Snapshot stored; undo with: trustgate restore {}", run_id);
    }
    write_report(finished, report)?;
    Ok(if outcome.is_success() { 0 } else { 2 })
}

fn restore(station: &Station, run_id: RunId) -> Exit {
    let report = station.layer.restore(run_id)?;
    println!("Restored run {}", run_id);
    for path in &report.rewritten {
        println!("  rewrote  {}", path);
    }
    for path in &report.recreated_dirs {
        println!("  mkdir    {}", path);
    }
    for path in &report.removed {
        println!("  removed  {}", path);
    }
    Ok(0)
}

fn snapshots(station: &Station, prune: Option<RunId>) -> Exit {
    if let Some(run_id) = prune {
        station.snapshots.prune(run_id)?;
        println!("Pruned snapshot {}", run_id);
        return Ok(0);
    }
    let listed = station.snapshots.list()?;
    if listed.is_empty() {
        println!("No snapshots.");
    }
    for summary in listed {
        println!(
            "{}  {}  {}  {} entries",
            summary.run_id,
            summary.environment,
            summary.created_at.format("%Y-%m-%d %H:%M:%S"),
            summary.entries
        );
    }
    Ok(0)
}

fn verify_log(root: &Path) -> Exit {
    let path = audit_log_path(root);
    let report = FileAuditWriter::verify_file(&path)?;
    if report.is_valid() {
        println!("Audit chain intact: {} records ({})", report.length, path.display());
        return Ok(0);
    }
    println!(
        "Audit chain BROKEN: {} of {} records fail verification, first at #{}",
        report.invalid.len(),
        report.length,
        report.first_invalid.unwrap_or_default()
    );
    Ok(2)
}

fn export(root: &Path, out: Option<&Path>) -> Exit {
    let log = FileAuditWriter::export_file(audit_log_path(root))?;
    match out {
        Some(path) => {
            log.write_to(path)?;
            println!("Exported {} records to {}", log.records.len(), path.display());
        }
        None => println!("{}", log.to_pretty_json()?),
    }
    Ok(0)
}

fn seed(station: &Station, env: Environment) -> Exit {
    let created = seed_demo_files(station.layer.sandbox(), env)?;
    if created.is_empty() {
        println!("Demo files already present in {}", env);
    }
    for path in created {
        println!("created {}/{}", env, path);
    }
    Ok(0)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_plan(path: Option<&Path>) -> TrustResult<String> {
    let io = |what: String, e: std::io::Error| TrustError::Io {
        path: what,
        reason: e.to_string(),
    };
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| io(path.display().to_string(), e)),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| io("<stdin>".to_string(), e))?;
            Ok(text)
        }
    }
}

fn write_report(run: RunRecord, path: Option<&Path>) -> TrustResult<()> {
    let Some(path) = path else { return Ok(()) };
    std::fs::write(path, render_risk_summary(&run)).map_err(|e| TrustError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    println!("Risk report written to {}", path.display());
    Ok(())
}
