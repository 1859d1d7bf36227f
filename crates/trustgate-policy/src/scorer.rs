//! Keyword risk scoring.
//!
//! Per action, in order:
//!
//! 1. Baseline by kind: `delete_file`, `move` → Medium; the rest → Low.
//! 2. High-risk keywords found in a path or the content → High.
//! 3. Medium-risk hints found in a path or the content → at least Medium.
//! 4. A kind outside `allowed_actions` → High.
//! 5. `delete_file` against `prod` → High.
//!
//! Matching is a case-insensitive substring test. Every rule that fires is
//! recorded; a keyword is reported once per action, against the first
//! target it matched.

use tracing::debug;

use trustgate_contracts::{
    action::{Action, ActionKind, Environment},
    policy::PolicyConfig,
    risk::{PlanAssessment, RiskAssessment, RiskReason, RiskTier},
};
use trustgate_core::traits::RiskScorer;

/// The built-in `RiskScorer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRiskScorer;

impl KeywordRiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// The tier an action kind carries before any keyword is considered.
    pub fn baseline(kind: ActionKind) -> RiskTier {
        match kind {
            ActionKind::DeleteFile | ActionKind::Move => RiskTier::Medium,
            ActionKind::Write | ActionKind::Append | ActionKind::MakeDir => RiskTier::Low,
        }
    }

    /// Score every action of a plan under one config.
    pub fn score_plan(&self, actions: &[Action], policy: &PolicyConfig) -> PlanAssessment {
        PlanAssessment::new(actions.iter().map(|a| self.score(a, policy)).collect())
    }
}

impl RiskScorer for KeywordRiskScorer {
    fn score(&self, action: &Action, policy: &PolicyConfig) -> RiskAssessment {
        let mut reasons = vec![RiskReason::ActionClass {
            kind: action.kind,
            tier: Self::baseline(action.kind),
        }];

        let targets: Vec<(&str, String)> = action
            .scan_targets()
            .map(|t| (t, t.to_lowercase()))
            .collect();

        for keyword in &policy.high_risk_keywords {
            if let Some(matched_in) = first_match(&targets, keyword) {
                reasons.push(RiskReason::HighRiskKeyword {
                    keyword: keyword.clone(),
                    matched_in,
                });
            }
        }
        for hint in &policy.med_risk_hints {
            if let Some(matched_in) = first_match(&targets, hint) {
                reasons.push(RiskReason::MediumRiskHint {
                    hint: hint.clone(),
                    matched_in,
                });
            }
        }

        if !policy.is_allowed(action.kind) {
            reasons.push(RiskReason::DisallowedAction { kind: action.kind });
        }
        if action.kind == ActionKind::DeleteFile && action.environment == Environment::Prod {
            reasons.push(RiskReason::ProtectedDelete {
                environment: action.environment,
            });
        }

        let assessment = RiskAssessment::from_reasons(action.index, reasons);
        debug!(
            action_index = action.index,
            kind = %action.kind,
            tier = %assessment.tier,
            rules = assessment.reasons.len(),
            "action scored"
        );
        assessment
    }
}

fn first_match(targets: &[(&str, String)], needle: &str) -> Option<String> {
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    targets
        .iter()
        .find(|(_, lowered)| lowered.contains(&needle))
        .map(|(original, _)| original.to_string())
}
