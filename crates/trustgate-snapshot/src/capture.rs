//! Reading pre-run state into memory.
//!
//! For every path a plan names, the capture records the path itself and each
//! of its ancestors inside the workspace, so directories an action creates
//! implicitly can be removed again. A named path that is a directory is
//! captured recursively; this covers the source of a directory `move`.

use std::collections::BTreeMap;
use std::fs;

use tracing::debug;

use trustgate_contracts::{
    action::Environment,
    error::{TrustError, TrustResult},
    plan::RunId,
    snapshot::{CapturedState, Snapshot},
};
use trustgate_core::sandbox::{normalize_relative, Sandbox};

/// Capture `paths` (workspace-relative) into an in-memory `Snapshot`.
///
/// Nothing is written. Any path that exists but cannot be read fails the
/// whole capture with `TrustError::Snapshot`.
pub fn capture_paths(
    run_id: RunId,
    sandbox: &Sandbox,
    environment: Environment,
    paths: &[&str],
) -> TrustResult<Snapshot> {
    let mut snapshot = Snapshot::new(run_id, environment);

    for raw in paths {
        let path = normalize_relative(raw).ok_or_else(|| TrustError::PathViolation {
            line: None,
            path: raw.to_string(),
        })?;
        for ancestor in ancestors(&path) {
            capture_one(sandbox, environment, ancestor, false, &mut snapshot.entries)?;
        }
        capture_one(sandbox, environment, &path, true, &mut snapshot.entries)?;
    }

    debug!(
        run_id = %run_id,
        environment = %environment,
        entries = snapshot.entries.len(),
        "workspace state captured"
    );
    Ok(snapshot)
}

/// Proper ancestors of a normalized relative path, shallowest first.
///
/// `a/b/c.txt` gives `a`, `a/b`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Number of segments in a normalized relative path.
pub fn depth(path: &str) -> usize {
    path.split('/').count()
}

fn capture_one(
    sandbox: &Sandbox,
    environment: Environment,
    rel: &str,
    recurse: bool,
    entries: &mut BTreeMap<String, CapturedState>,
) -> TrustResult<()> {
    // A directory first seen as an ancestor was recorded without its
    // children; a later named reference must still descend into it.
    match entries.get(rel) {
        Some(CapturedState::Directory) if recurse => {}
        Some(_) => return Ok(()),
        None => {}
    }
    let abs = sandbox.resolve(environment, rel)?;
    let failed = |reason: String| TrustError::Snapshot {
        path: rel.to_string(),
        reason,
    };

    let meta = match fs::symlink_metadata(&abs) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            entries.insert(rel.to_string(), CapturedState::Absent);
            return Ok(());
        }
        Err(e) => return Err(failed(e.to_string())),
    };

    if !meta.is_dir() {
        let bytes = fs::read(&abs).map_err(|e| failed(e.to_string()))?;
        entries.insert(rel.to_string(), CapturedState::File(bytes));
        return Ok(());
    }

    entries.insert(rel.to_string(), CapturedState::Directory);
    if !recurse {
        return Ok(());
    }
    let children = fs::read_dir(&abs).map_err(|e| failed(e.to_string()))?;
    for child in children {
        let child = child.map_err(|e| failed(e.to_string()))?;
        let name = child.file_name();
        let name = name
            .to_str()
            .ok_or_else(|| failed(format!("non UTF-8 entry name {:?}", name)))?;
        capture_one(sandbox, environment, &format!("{}/{}", rel, name), true, entries)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ancestors, depth};

    #[test]
    fn ancestors_are_shallowest_first() {
        assert_eq!(ancestors("a/b/c.txt").collect::<Vec<_>>(), vec!["a", "a/b"]);
        assert!(ancestors("top.txt").next().is_none());
    }

    #[test]
    fn depth_counts_segments() {
        assert_eq!(depth("a"), 1);
        assert_eq!(depth("a/b/c"), 3);
    }
}
