//! Markdown risk summary for a run.

use std::fmt::Write;

use chrono::Utc;

use trustgate_contracts::run::{PendingReason, RunRecord};

/// Render a human-readable risk report for `run`.
///
/// Lists the environment, aggregate tier and state, every fired rule per
/// action, and the planned actions in order.
pub fn render_risk_summary(run: &RunRecord) -> String {
    let mut md = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut md, run);
    md
}

fn write_summary(md: &mut String, run: &RunRecord) -> std::fmt::Result {
    writeln!(md, "# Risk Analysis Report")?;
    writeln!(md)?;
    writeln!(md, "**Run:** `{}`", run.run_id())?;
    writeln!(md, "**Environment:** {}", run.plan.environment)?;
    if let Some(task) = &run.plan.task {
        writeln!(md, "**Task:** {}", task)?;
    }
    writeln!(md, "**Overall Risk Level:** {}", run.tier())?;
    writeln!(md, "**State:** {}", run.state)?;
    writeln!(md, "**Generated:** {} UTC", Utc::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(md)?;

    match &run.pending {
        Some(PendingReason::PolicyBlock { reason }) => {
            writeln!(md, "> **Blocked by policy:** {}", reason)?;
            writeln!(md)?;
        }
        Some(PendingReason::Risk { tier }) => {
            writeln!(md, "> {} risk: human approval required.", tier)?;
            writeln!(md)?;
        }
        None => {}
    }

    writeln!(md, "## Risk Assessment")?;
    writeln!(md)?;
    let factors: Vec<String> = run
        .assessment
        .iter()
        .flat_map(|a| a.reasons())
        .map(|(index, reason)| format!("- action {}: {}", index + 1, reason))
        .collect();
    if factors.is_empty() {
        writeln!(md, "No specific risk factors identified.")?;
    } else {
        writeln!(md, "**Risk Factors:**")?;
        for factor in factors {
            writeln!(md, "{}", factor)?;
        }
    }

    writeln!(md)?;
    writeln!(md, "## Planned Actions ({} total)", run.plan.actions.len())?;
    writeln!(md)?;
    for (i, action) in run.plan.actions.iter().enumerate() {
        let tier = run
            .assessment
            .as_ref()
            .and_then(|a| a.actions.get(i))
            .map(|a| a.tier.to_string())
            .unwrap_or_else(|| "unscored".to_string());
        writeln!(md, "{}. `{}` ({})", i + 1, action.raw, tier)?;
    }

    if let Some(decision) = &run.decision {
        writeln!(md)?;
        writeln!(md, "## Decision")?;
        writeln!(md)?;
        writeln!(
            md,
            "{} by **{}** at {}",
            decision.decision,
            decision.approver,
            decision.timestamp.format("%Y-%m-%d %H:%M:%S")
        )?;
        if !decision.rationale.is_empty() {
            writeln!(md, "> {}", decision.rationale)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use trustgate_contracts::{
        action::{ActionKind, Environment},
        plan::Plan,
        risk::{PlanAssessment, RiskAssessment, RiskReason, RiskTier},
        run::{PendingReason, RunRecord, RunState},
    };

    use crate::parser::parse_plan;

    use super::render_risk_summary;

    fn scored(text: &str) -> RunRecord {
        let env = Environment::Prod;
        let plan = Plan::new(env, parse_plan(text, env).unwrap(), Some("rotate config".to_string()));
        let mut run = RunRecord::submitted(plan);
        run.assessment = Some(PlanAssessment::new(vec![RiskAssessment::from_reasons(
            0,
            vec![
                RiskReason::ActionClass { kind: ActionKind::Write, tier: RiskTier::Low },
                RiskReason::MediumRiskHint {
                    hint: "secrets".to_string(),
                    matched_in: "secrets".to_string(),
                },
            ],
        )]));
        run.state = RunState::PendingApproval;
        run.pending = Some(PendingReason::PolicyBlock {
            reason: "environment 'prod' is locked".to_string(),
        });
        run
    }

    #[test]
    fn summary_lists_tier_reasons_and_actions() {
        let md = render_risk_summary(&scored("write prod/config.yaml | secrets"));

        assert!(md.starts_with("# Risk Analysis Report"));
        assert!(md.contains("**Environment:** prod"));
        assert!(md.contains("**Overall Risk Level:** Medium"));
        assert!(md.contains("**Task:** rotate config"));
        assert!(md.contains("Blocked by policy"));
        assert!(md.contains("secrets"));
        assert!(md.contains("## Planned Actions (1 total)"));
        assert!(md.contains("1. `write prod/config.yaml | secrets` (Medium)"));
    }

    #[test]
    fn unscored_run_has_no_factors() {
        let plan = Plan::new(Environment::Dev, parse_plan("make_dir a", Environment::Dev).unwrap(), None);
        let md = render_risk_summary(&RunRecord::submitted(plan));
        assert!(md.contains("No specific risk factors identified."));
        assert!(md.contains("(unscored)"));
    }
}
