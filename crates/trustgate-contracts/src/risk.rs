//! Risk tier and assessment types.
//!
//! Tiers form a total order `Low < Medium < High`. Every scoring rule can
//! only raise a tier, so both per-action promotion and plan aggregation are
//! a single `max`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, Environment};

/// Risk classification driving the approval requirement.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Raise `self` to at least `floor`. Never lowers.
    pub fn promote(self, floor: RiskTier) -> RiskTier {
        self.max(floor)
    }

    /// Combine any number of tiers; the empty combination is `Low`.
    pub fn aggregate(tiers: impl IntoIterator<Item = RiskTier>) -> RiskTier {
        tiers.into_iter().fold(RiskTier::Low, RiskTier::promote)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scoring rule that fired for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RiskReason {
    /// Baseline tier contributed by the action kind.
    ActionClass { kind: ActionKind, tier: RiskTier },
    /// A high-risk keyword matched a path or the content.
    HighRiskKeyword { keyword: String, matched_in: String },
    /// A medium-risk hint matched a path or the content.
    MediumRiskHint { hint: String, matched_in: String },
    /// The kind is not in the policy's `allowed_actions`.
    DisallowedAction { kind: ActionKind },
    /// Deleting a file in a production environment.
    ProtectedDelete { environment: Environment },
}

impl RiskReason {
    /// The tier this reason promotes its action to, at minimum.
    pub fn tier(&self) -> RiskTier {
        match self {
            RiskReason::ActionClass { tier, .. } => *tier,
            RiskReason::HighRiskKeyword { .. } => RiskTier::High,
            RiskReason::MediumRiskHint { .. } => RiskTier::Medium,
            RiskReason::DisallowedAction { .. } => RiskTier::High,
            RiskReason::ProtectedDelete { .. } => RiskTier::High,
        }
    }
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskReason::ActionClass { kind, tier } => {
                write!(f, "action class '{}' has baseline {} risk", kind, tier)
            }
            RiskReason::HighRiskKeyword { keyword, matched_in } => {
                write!(f, "high-risk keyword '{}' in '{}'", keyword, matched_in)
            }
            RiskReason::MediumRiskHint { hint, matched_in } => {
                write!(f, "medium-risk hint '{}' in '{}'", hint, matched_in)
            }
            RiskReason::DisallowedAction { kind } => {
                write!(f, "action '{}' is not in allowed_actions", kind)
            }
            RiskReason::ProtectedDelete { environment } => {
                write!(f, "deleting files in {} requires explicit approval", environment)
            }
        }
    }
}

/// The scorer's verdict for a single action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub action_index: usize,
    pub tier: RiskTier,
    /// Every rule that fired, in evaluation order.
    pub reasons: Vec<RiskReason>,
}

impl RiskAssessment {
    /// Build an assessment whose tier is the max over `reasons`.
    pub fn from_reasons(action_index: usize, reasons: Vec<RiskReason>) -> Self {
        let tier = RiskTier::aggregate(reasons.iter().map(RiskReason::tier));
        Self { action_index, tier, reasons }
    }

    /// Keywords and hints that matched, high-risk first within each reason list.
    pub fn matched_keywords(&self) -> Vec<&str> {
        self.reasons
            .iter()
            .filter_map(|r| match r {
                RiskReason::HighRiskKeyword { keyword, .. } => Some(keyword.as_str()),
                RiskReason::MediumRiskHint { hint, .. } => Some(hint.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// All per-action assessments for a plan plus the aggregate tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAssessment {
    pub tier: RiskTier,
    pub actions: Vec<RiskAssessment>,
}

impl PlanAssessment {
    pub fn new(actions: Vec<RiskAssessment>) -> Self {
        let tier = RiskTier::aggregate(actions.iter().map(|a| a.tier));
        Self { tier, actions }
    }

    /// Every reason across the plan, paired with its action index.
    pub fn reasons(&self) -> impl Iterator<Item = (usize, &RiskReason)> {
        self.actions
            .iter()
            .flat_map(|a| a.reasons.iter().map(move |r| (a.action_index, r)))
    }
}
