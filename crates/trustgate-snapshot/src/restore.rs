//! Putting a workspace back to a captured state.
//!
//! Two passes:
//!
//! 1. Paths captured as `Absent` are removed, deepest first.
//! 2. Directories are recreated and file bytes rewritten, shallowest first.
//!
//! Both passes compare against what is on disk, so running a restore a
//! second time changes nothing.

use std::fs;
use std::path::Path;

use tracing::debug;

use trustgate_contracts::{
    error::{TrustError, TrustResult},
    snapshot::{CapturedState, RestoreReport, Snapshot},
};
use trustgate_core::sandbox::Sandbox;

use crate::capture::depth;

pub fn restore_snapshot(snapshot: &Snapshot, sandbox: &Sandbox) -> TrustResult<RestoreReport> {
    let env = snapshot.environment;
    let mut report = RestoreReport::default();

    let mut absent: Vec<&String> = snapshot
        .entries
        .iter()
        .filter(|(_, state)| state.is_absent())
        .map(|(path, _)| path)
        .collect();
    absent.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));

    for rel in absent {
        let abs = sandbox.resolve(env, rel)?;
        let Ok(meta) = fs::symlink_metadata(&abs) else {
            continue;
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&abs)
        } else {
            fs::remove_file(&abs)
        };
        removed.map_err(|e| io_error(&abs, e))?;
        report.removed.push(rel.clone());
    }

    let mut present: Vec<(&String, &CapturedState)> = snapshot
        .entries
        .iter()
        .filter(|(_, state)| !state.is_absent())
        .collect();
    present.sort_by(|(a, _), (b, _)| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));

    for (rel, state) in present {
        let abs = sandbox.resolve(env, rel)?;
        let existing = fs::symlink_metadata(&abs).ok();
        match state {
            CapturedState::Directory => {
                if existing.as_ref().is_some_and(|m| m.is_dir()) {
                    continue;
                }
                if existing.is_some() {
                    fs::remove_file(&abs).map_err(|e| io_error(&abs, e))?;
                }
                fs::create_dir_all(&abs).map_err(|e| io_error(&abs, e))?;
                report.recreated_dirs.push(rel.clone());
            }
            CapturedState::File(bytes) => {
                match &existing {
                    Some(meta) if meta.is_dir() => {
                        fs::remove_dir_all(&abs).map_err(|e| io_error(&abs, e))?;
                    }
                    Some(_) => {
                        if fs::read(&abs).is_ok_and(|current| current == *bytes) {
                            continue;
                        }
                    }
                    None => {}
                }
                if let Some(parent) = abs.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
                }
                fs::write(&abs, bytes).map_err(|e| io_error(&abs, e))?;
                report.rewritten.push(rel.clone());
            }
            CapturedState::Absent => {}
        }
    }

    debug!(
        run_id = %snapshot.run_id,
        rewritten = report.rewritten.len(),
        recreated_dirs = report.recreated_dirs.len(),
        removed = report.removed.len(),
        "snapshot applied"
    );
    Ok(report)
}

fn io_error(path: &Path, err: std::io::Error) -> TrustError {
    TrustError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
