//! Policy configuration type.
//!
//! `PolicyConfig` is the live, reloadable policy. Validation and loading
//! live in `trustgate-policy`; this crate only defines the shape and the
//! built-in defaults so every crate can read a config without depending on
//! the loader.

use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, Environment};

/// The active policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// When true, no action may execute against `prod`.
    pub prod_locked: bool,
    /// When true, no action may execute against `staging`.
    #[serde(default)]
    pub staging_locked: bool,
    /// Kinds the trust layer will execute.
    pub allowed_actions: Vec<ActionKind>,
    /// Substrings that promote an action to High risk.
    pub high_risk_keywords: Vec<String>,
    /// Substrings that promote an action to at least Medium risk.
    pub med_risk_hints: Vec<String>,
}

impl PolicyConfig {
    /// Return true if `environment` carries a lock flag that is set.
    pub fn is_locked(&self, environment: Environment) -> bool {
        match environment {
            Environment::Prod => self.prod_locked,
            Environment::Staging => self.staging_locked,
            Environment::Dev => false,
        }
    }

    pub fn is_allowed(&self, kind: ActionKind) -> bool {
        self.allowed_actions.contains(&kind)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            prod_locked: true,
            staging_locked: false,
            allowed_actions: ActionKind::ALL.to_vec(),
            high_risk_keywords: strings(&[
                "drop table",
                "delete database",
                "rm -rf",
                "truncate",
                "kubectl delete",
                "terraform destroy",
                "shutdown",
                "format",
                "wipe",
                "vault delete",
                "aws s3 rm",
                "gcloud sql instances delete",
            ]),
            med_risk_hints: strings(&[
                "overwrite",
                "migrate",
                "secrets",
                "credentials",
                "prod",
                "production",
            ]),
        }
    }
}
