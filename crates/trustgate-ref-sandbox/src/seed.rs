//! Demo files for a fresh workspace.
//!
//! The scenarios and the `seed` CLI command use the same two files so that
//! the sample plans have something to move and delete:
//!
//! - `tmp/output.txt` containing `hello`
//! - `old/legacy.sql`, empty

use std::fs;

use tracing::info;

use trustgate_contracts::{
    action::Environment,
    error::{TrustError, TrustResult},
};
use trustgate_core::Sandbox;

/// Files created by `seed_demo_files`, with their initial contents.
pub const DEMO_FILES: [(&str, &str); 2] = [("tmp/output.txt", "hello"), ("old/legacy.sql", "")];

/// A plan touching every action kind against the demo files.
pub const SAMPLE_PLAN: &str = "\
# Prepare a release folder and update README
write releases/notes.md | Release v1.2 notes
append README.md | Added release instructions
make_dir releases/2025-08-29
move tmp/output.txt reports/output.txt
delete_file old/legacy.sql
";

/// Create the demo files in `environment`'s workspace.
///
/// Existing files are left alone. Returns the paths that were created.
pub fn seed_demo_files(sandbox: &Sandbox, environment: Environment) -> TrustResult<Vec<String>> {
    let mut created = Vec::new();
    for (rel, contents) in DEMO_FILES {
        let path = sandbox.resolve(environment, rel)?;
        if path.exists() {
            continue;
        }
        let io = |e: std::io::Error| TrustError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&path, contents).map_err(io)?;
        created.push(rel.to_string());
    }
    info!(environment = %environment, created = created.len(), "demo files seeded");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent_and_keeps_edits() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();

        let created = seed_demo_files(&sandbox, Environment::Staging).unwrap();
        assert_eq!(created, vec!["tmp/output.txt", "old/legacy.sql"]);

        let output = sandbox.workspace(Environment::Staging).join("tmp/output.txt");
        assert_eq!(fs::read_to_string(&output).unwrap(), "hello");
        fs::write(&output, "edited").unwrap();

        assert!(seed_demo_files(&sandbox, Environment::Staging).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&output).unwrap(), "edited");
        assert!(!sandbox.workspace(Environment::Dev).join("tmp").exists());
    }

    #[test]
    fn sample_plan_parses() {
        let actions = trustgate_core::parse_plan(SAMPLE_PLAN, Environment::Dev).unwrap();
        assert_eq!(actions.len(), 5);
    }
}
