//! Reference scenarios.
//!
//! Each scenario builds its own [`Harness`](crate::wiring::Harness) (fresh
//! sandbox, fresh audit chain) and drives one plan through the trust layer.
//! `run()` returns a summary the tests assert on; `run_scenario()` prints a
//! walkthrough for the `trustgate scenarios` command.

pub mod mixed_risk_approval;
pub mod move_conflict;
pub mod prod_lock;
pub mod rollback;

use trustgate_audit::InMemoryAuditWriter;
use trustgate_contracts::error::TrustResult;

/// Run every scenario in order, stopping at the first error.
pub fn run_all() -> TrustResult<()> {
    mixed_risk_approval::run_scenario()?;
    prod_lock::run_scenario()?;
    move_conflict::run_scenario()?;
    rollback::run_scenario()?;
    Ok(())
}

/// Print the audit trail and its chain verdict.
pub(crate) fn print_audit_trail(audit: &InMemoryAuditWriter) -> TrustResult<()> {
    let records = audit.records()?;
    println!("  Audit trail ({} records):", records.len());
    for record in &records {
        println!("    #{:<3} {}", record.sequence, record.entry.event);
    }
    let report = audit.verify_integrity()?;
    println!(
        "  Audit chain integrity: {}",
        if report.is_valid() { "VERIFIED" } else { "BROKEN" }
    );
    Ok(())
}
