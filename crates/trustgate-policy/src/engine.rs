//! Hot-reloadable policy engine.
//!
//! `LivePolicyEngine` holds the active `PolicyConfig` behind a
//! `RwLock<Arc<_>>`. Readers clone the `Arc` and keep a consistent config
//! for as long as they need it; a reload validates the new document first
//! and swaps the pointer only when it is clean.
//!
//! Reload algorithm:
//!
//! 1. Validate the document against the policy schema, collecting every problem.
//! 2. On failure: keep the old config, audit `ConfigRejected`, return `Config`.
//! 3. On success: audit `ConfigReloaded` and swap.
//!
//! Steps 2 and 3 run under the write lock, so reloads are serialised with
//! each other and with their audit records.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};
use tracing::{info, warn};

use trustgate_contracts::{
    audit::{AuditEntry, AuditEventKind},
    error::{TrustError, TrustResult},
    policy::PolicyConfig,
};
use trustgate_core::traits::{AuditWriter, PolicyEngine};

use crate::config;

/// A `PolicyEngine` whose config can be replaced while the trust layer runs.
///
/// ```rust,ignore
/// use trustgate_policy::engine::LivePolicyEngine;
///
/// let engine = LivePolicyEngine::new(PolicyConfig::default(), audit.clone());
/// engine.reload_from_file(Path::new("policies/default.toml"))?;
/// ```
pub struct LivePolicyEngine {
    active: RwLock<Arc<PolicyConfig>>,
    audit: Arc<dyn AuditWriter>,
}

impl LivePolicyEngine {
    pub fn new(initial: PolicyConfig, audit: Arc<dyn AuditWriter>) -> Self {
        Self {
            active: RwLock::new(Arc::new(initial)),
            audit,
        }
    }

    /// Validate `document` and make it the active config.
    ///
    /// # Errors
    ///
    /// `TrustError::Config` listing every problem; the previous config stays
    /// active. `AuditWriteFailed` if the outcome cannot be recorded, in which
    /// case nothing is swapped.
    pub fn reload(&self, document: &Value) -> TrustResult<Arc<PolicyConfig>> {
        self.apply(config::from_value(document), "document")
    }

    pub fn reload_toml_str(&self, s: &str) -> TrustResult<Arc<PolicyConfig>> {
        self.apply(config::from_toml_str(s), "toml")
    }

    /// Read `path` (TOML, or JSON by extension) and reload from it.
    pub fn reload_from_file(&self, path: &Path) -> TrustResult<Arc<PolicyConfig>> {
        let source = path.display().to_string();
        self.apply(config::from_file(path), &source)
    }

    fn apply(&self, parsed: TrustResult<PolicyConfig>, source: &str) -> TrustResult<Arc<PolicyConfig>> {
        // Held across the audit append and the swap so that concurrent
        // reloads land in the chain in the order they take effect. Audit
        // writers never read the policy, so this cannot deadlock.
        // A poisoned lock still holds a whole Arc; the swap is a single store.
        let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());

        let next = match parsed {
            Ok(next) => next,
            Err(err) => {
                let problems = match &err {
                    TrustError::Config { problems } => problems.clone(),
                    other => vec![other.to_string()],
                };
                warn!(source = %source, problems = ?problems, "policy reload rejected");
                self.audit.append(&AuditEntry::global(
                    AuditEventKind::ConfigRejected,
                    json!({ "source": source, "problems": problems }),
                ))?;
                return Err(err);
            }
        };

        self.audit.append(&AuditEntry::global(
            AuditEventKind::ConfigReloaded,
            json!({ "source": source, "config": next }),
        ))?;

        let next = Arc::new(next);
        *active = Arc::clone(&next);
        drop(active);

        info!(
            source = %source,
            prod_locked = next.prod_locked,
            staging_locked = next.staging_locked,
            "policy reloaded"
        );
        Ok(next)
    }
}

impl PolicyEngine for LivePolicyEngine {
    fn current(&self) -> Arc<PolicyConfig> {
        let active = self.active.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&active)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use trustgate_contracts::{
        action::{ActionKind, Environment},
        audit::{AuditEntry, AuditEventKind},
        error::{TrustError, TrustResult},
        policy::PolicyConfig,
    };
    use trustgate_core::traits::{AuditWriter, PolicyEngine};

    use super::LivePolicyEngine;

    #[derive(Default)]
    struct RecordingAudit {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl AuditWriter for RecordingAudit {
        fn append(&self, entry: &AuditEntry) -> TrustResult<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn engine() -> (Arc<RecordingAudit>, LivePolicyEngine) {
        let audit = Arc::new(RecordingAudit::default());
        let engine = LivePolicyEngine::new(PolicyConfig::default(), audit.clone());
        (audit, engine)
    }

    #[test]
    fn lock_is_independent_of_kind() {
        let (_audit, engine) = engine();
        assert!(!engine.is_writable(Environment::Prod));
        assert!(engine.is_writable(Environment::Staging));
        assert!(engine.is_writable(Environment::Dev));
        assert!(engine.is_allowed(ActionKind::MakeDir));
    }

    #[test]
    fn valid_reload_swaps_and_audits() {
        let (audit, engine) = engine();
        let before = engine.current();

        engine
            .reload(&json!({
                "prod_locked": false,
                "staging_locked": true,
                "allowed_actions": ["write", "make_dir"],
                "high_risk_keywords": [],
                "med_risk_hints": []
            }))
            .unwrap();

        assert!(engine.is_writable(Environment::Prod));
        assert!(!engine.is_writable(Environment::Staging));
        assert!(!engine.is_allowed(ActionKind::DeleteFile));
        // Holders of the old Arc are unaffected.
        assert!(before.prod_locked);

        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEventKind::ConfigReloaded);
        assert!(entries[0].run_id.is_none());
    }

    #[test]
    fn invalid_reload_keeps_old_config_and_audits_rejection() {
        let (audit, engine) = engine();

        let err = engine
            .reload(&json!({ "prod_locked": "no", "allowed_actions": ["write"] }))
            .unwrap_err();

        let TrustError::Config { problems } = err else {
            panic!("expected a config error");
        };
        assert!(problems.len() >= 2);
        assert_eq!(*engine.current(), PolicyConfig::default());

        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries[0].event, AuditEventKind::ConfigRejected);
        assert!(entries[0].payload["problems"].as_array().unwrap().len() >= 2);
    }

    #[test]
    fn reload_from_toml_text_and_file() {
        let (audit, engine) = engine();
        engine
            .reload_toml_str(
                "prod_locked = false\nallowed_actions = [\"write\"]\nhigh_risk_keywords = []\nmed_risk_hints = []\n",
            )
            .unwrap();
        assert!(engine.is_writable(Environment::Prod));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "prod_locked = true\n").unwrap();
        assert!(engine.reload_from_file(&path).is_err());
        assert!(engine.is_writable(Environment::Prod));

        let events: Vec<AuditEventKind> = audit.entries.lock().unwrap().iter().map(|e| e.event).collect();
        assert_eq!(events, vec![AuditEventKind::ConfigReloaded, AuditEventKind::ConfigRejected]);
    }

    #[test]
    fn concurrent_reloads_leave_chain_and_config_in_agreement() {
        let (audit, engine) = engine();
        let engine = Arc::new(engine);

        let writers: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        engine
                            .reload(&json!({
                                "prod_locked": true,
                                "allowed_actions": ["write"],
                                "high_risk_keywords": [format!("writer-{}-{}", t, i)],
                                "med_risk_hints": []
                            }))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries.len(), 8 * 25);
        let last = entries.last().unwrap();
        assert_eq!(last.event, AuditEventKind::ConfigReloaded);
        let recorded: PolicyConfig = serde_json::from_value(last.payload["config"].clone()).unwrap();
        assert_eq!(recorded, *engine.current());
    }

    #[test]
    fn readers_never_see_a_partial_config() {
        let (_audit, engine) = engine();
        let engine = Arc::new(engine);
        let unlocked = json!({
            "prod_locked": false,
            "allowed_actions": [],
            "high_risk_keywords": [],
            "med_risk_hints": []
        });

        let writer = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..50 {
                    if i % 2 == 0 {
                        engine.reload(&unlocked).unwrap();
                    } else {
                        engine.reload(&serde_json::to_value(PolicyConfig::default()).unwrap()).unwrap();
                    }
                }
            })
        };

        for _ in 0..200 {
            let config = engine.current();
            // Either the default (locked, all kinds) or the unlocked, empty one.
            assert_eq!(config.prod_locked, !config.allowed_actions.is_empty());
        }
        writer.join().unwrap();
    }
}
