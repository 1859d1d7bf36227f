//! # trustgate-policy
//!
//! The live policy and the keyword risk scorer for the TRUSTGATE trust layer.
//!
//! ## Overview
//!
//! This crate provides [`LivePolicyEngine`], which implements the
//! [`PolicyEngine`](trustgate_core::traits::PolicyEngine) trait over a
//! hot-reloadable [`PolicyConfig`](trustgate_contracts::policy::PolicyConfig),
//! and [`KeywordRiskScorer`], which implements
//! [`RiskScorer`](trustgate_core::traits::RiskScorer).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use trustgate_policy::{config, LivePolicyEngine, KeywordRiskScorer};
//!
//! let initial = config::load_or_default(Some(Path::new("policies/default.toml")))?;
//! let engine = LivePolicyEngine::new(initial, audit.clone());
//! // Pass `engine` and `KeywordRiskScorer` to `trustgate_core::TrustLayer::new(...)`.
//! ```
//!
//! ## Locks versus risk
//!
//! A lock flag makes an environment unwritable no matter how low the risk.
//! The scorer never looks at locks; the gate and executor do.

pub mod config;
pub mod engine;
pub mod scorer;

pub use engine::LivePolicyEngine;
pub use scorer::KeywordRiskScorer;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use trustgate_contracts::{
        action::Environment,
        audit::AuditEntry,
        error::TrustResult,
        risk::RiskTier,
    };
    use trustgate_core::{parse_plan, traits::{AuditWriter, PolicyEngine}};

    use super::*;

    #[derive(Default)]
    struct NullAudit(Mutex<usize>);

    impl AuditWriter for NullAudit {
        fn append(&self, _entry: &AuditEntry) -> TrustResult<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    const DEFAULT_TOML: &str = include_str!("../policies/default.toml");

    #[test]
    fn reload_changes_scores_for_later_plans() {
        let audit = Arc::new(NullAudit::default());
        let engine = LivePolicyEngine::new(config::from_toml_str(DEFAULT_TOML).unwrap(), audit.clone());
        let actions = parse_plan("write notes/todo.md | wipe the cache", Environment::Dev).unwrap();

        let before = KeywordRiskScorer.score_plan(&actions, &engine.current());
        assert_eq!(before.tier, RiskTier::High);

        engine
            .reload_toml_str(
                "prod_locked = true\n\
                 allowed_actions = [\"write\"]\n\
                 high_risk_keywords = []\n\
                 med_risk_hints = [\"cache\"]\n",
            )
            .unwrap();

        let after = KeywordRiskScorer.score_plan(&actions, &engine.current());
        assert_eq!(after.tier, RiskTier::Medium);
        assert_eq!(*audit.0.lock().unwrap(), 1);
    }
}
