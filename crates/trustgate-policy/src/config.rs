//! Policy document loading and structural validation.
//!
//! A policy document is TOML or JSON with this shape:
//!
//! ```toml
//! prod_locked = true
//! staging_locked = false          # optional
//! allowed_actions = ["write", "append", "delete_file", "move", "make_dir"]
//! high_risk_keywords = ["rm -rf", "drop table"]
//! med_risk_hints = ["secrets", "prod"]
//! ```
//!
//! Documents are checked against a JSON Schema before deserialisation so
//! that every structural problem is reported at once, not just the first
//! one serde trips over.

use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use trustgate_contracts::{
    action::ActionKind,
    error::{TrustError, TrustResult},
    policy::PolicyConfig,
};

/// The JSON Schema every policy document must satisfy.
pub fn policy_schema() -> Value {
    let kinds: Vec<&str> = ActionKind::ALL.iter().map(|k| k.as_str()).collect();
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "trustgate policy",
        "type": "object",
        "required": ["prod_locked", "allowed_actions", "high_risk_keywords", "med_risk_hints"],
        "properties": {
            "prod_locked": { "type": "boolean" },
            "staging_locked": { "type": "boolean" },
            "allowed_actions": {
                "type": "array",
                "items": { "enum": kinds }
            },
            "high_risk_keywords": {
                "type": "array",
                "items": { "type": "string" }
            },
            "med_risk_hints": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

/// Return every structural problem in `document`; empty when it is valid.
pub fn validate_document(document: &Value) -> Vec<String> {
    let schema = policy_schema();
    match jsonschema::validator_for(&schema) {
        Ok(validator) => validator
            .iter_errors(document)
            .map(|error| {
                let at = error.instance_path.to_string();
                if at.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", at, error)
                }
            })
            .collect(),
        Err(e) => vec![format!("policy schema failed to compile: {}", e)],
    }
}

/// Validate `document` and deserialise it.
pub fn from_value(document: &Value) -> TrustResult<PolicyConfig> {
    let problems = validate_document(document);
    if !problems.is_empty() {
        return Err(TrustError::Config { problems });
    }
    let config: PolicyConfig = serde_json::from_value(document.clone()).map_err(|e| TrustError::Config {
        problems: vec![e.to_string()],
    })?;
    debug!(
        prod_locked = config.prod_locked,
        staging_locked = config.staging_locked,
        allowed = config.allowed_actions.len(),
        "policy document validated"
    );
    Ok(config)
}

/// Parse TOML text into a JSON document without validating it.
pub fn toml_document(s: &str) -> TrustResult<Value> {
    toml::from_str::<Value>(s).map_err(|e| TrustError::Config {
        problems: vec![format!("failed to parse policy TOML: {}", e)],
    })
}

/// Parse JSON text into a document without validating it.
pub fn json_document(s: &str) -> TrustResult<Value> {
    serde_json::from_str::<Value>(s).map_err(|e| TrustError::Config {
        problems: vec![format!("failed to parse policy JSON: {}", e)],
    })
}

/// Read `path` as a document, choosing the format by extension.
///
/// `.json` is JSON; anything else is TOML.
pub fn read_document(path: &Path) -> TrustResult<Value> {
    let contents = std::fs::read_to_string(path).map_err(|e| TrustError::Config {
        problems: vec![format!("failed to read policy file '{}': {}", path.display(), e)],
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => json_document(&contents),
        _ => toml_document(&contents),
    }
}

pub fn from_toml_str(s: &str) -> TrustResult<PolicyConfig> {
    from_value(&toml_document(s)?)
}

pub fn from_json_str(s: &str) -> TrustResult<PolicyConfig> {
    from_value(&json_document(s)?)
}

pub fn from_file(path: &Path) -> TrustResult<PolicyConfig> {
    from_value(&read_document(path)?)
}

/// Load `path` if given, otherwise the built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> TrustResult<PolicyConfig> {
    match path {
        Some(path) => from_file(path),
        None => Ok(PolicyConfig::default()),
    }
}
