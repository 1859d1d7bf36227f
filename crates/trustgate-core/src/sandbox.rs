//! The file-system boundary.
//!
//! Every environment gets its own workspace directory under one sandbox
//! root. Plan paths are relative to that workspace; anything that would
//! land outside it, lexically or through a symlink, is a `PathViolation`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use trustgate_contracts::{
    action::Environment,
    error::{TrustError, TrustResult},
};

/// Normalize a workspace-relative path without touching the disk.
///
/// Drops `.` segments and folds `..` into its parent. Returns `None` when
/// the path is absolute or climbs above the workspace root. The result uses
/// `/` separators; an empty string means the workspace root itself.
pub fn normalize_relative(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                segments.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(segments.join("/"))
}

/// A sandbox root holding one workspace per environment.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open (creating if needed) the sandbox at `root` and its
    /// `dev`/`staging`/`prod` workspaces.
    pub fn open(root: impl AsRef<Path>) -> TrustResult<Self> {
        let root = root.as_ref();
        for env in Environment::ALL {
            let ws = root.join(env.as_str());
            fs::create_dir_all(&ws).map_err(|e| io_error(&ws, e))?;
        }
        let root = root.canonicalize().map_err(|e| io_error(root, e))?;
        Ok(Self { root })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The workspace directory for `environment`.
    pub fn workspace(&self, environment: Environment) -> PathBuf {
        self.root.join(environment.as_str())
    }

    /// Resolve a workspace-relative path to an absolute one.
    ///
    /// Fails with `PathViolation` if the path escapes the workspace, names
    /// the workspace root itself, or reaches outside through a symlink.
    pub fn resolve(&self, environment: Environment, relative: &str) -> TrustResult<PathBuf> {
        let violation = || TrustError::PathViolation {
            line: None,
            path: relative.to_string(),
        };

        let normalized = normalize_relative(relative).ok_or_else(violation)?;
        if normalized.is_empty() {
            return Err(violation());
        }

        let workspace = self.workspace(environment);
        let full = workspace.join(&normalized);

        // Symlinks: the deepest existing ancestor (or the path itself) must
        // canonicalize to somewhere inside the workspace.
        let mut cursor = full.as_path();
        loop {
            if fs::symlink_metadata(cursor).is_ok() {
                let canonical = cursor.canonicalize().map_err(|_| violation())?;
                if !canonical.starts_with(&workspace) {
                    warn!(
                        environment = %environment,
                        path = %relative,
                        resolved = %canonical.display(),
                        "path escapes workspace through a link"
                    );
                    return Err(violation());
                }
                break;
            }
            match cursor.parent() {
                Some(parent) if parent.starts_with(&workspace) => cursor = parent,
                _ => break,
            }
        }

        Ok(full)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TrustError {
    TrustError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize_relative("a/./b/../c.txt").as_deref(), Some("a/c.txt"));
        assert_eq!(normalize_relative("./a.txt").as_deref(), Some("a.txt"));
        assert_eq!(normalize_relative(".").as_deref(), Some(""));
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert_eq!(normalize_relative("../secret"), None);
        assert_eq!(normalize_relative("a/../../b"), None);
        assert_eq!(normalize_relative("/etc/passwd"), None);
    }

    #[test]
    fn open_creates_every_workspace() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();
        for env in Environment::ALL {
            assert!(sandbox.workspace(env).is_dir());
        }
    }

    #[test]
    fn resolve_stays_inside_workspace() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();
        let resolved = sandbox.resolve(Environment::Dev, "reports/out.txt").unwrap();
        assert!(resolved.starts_with(sandbox.workspace(Environment::Dev)));
        assert!(resolved.ends_with("reports/out.txt"));
    }

    #[test]
    fn resolve_rejects_traversal_and_root() {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();
        for bad in ["../prod/x", "/tmp/x", ".", "a/../.."] {
            match sandbox.resolve(Environment::Dev, bad) {
                Err(TrustError::PathViolation { path, .. }) => assert_eq!(path, bad),
                other => panic!("expected PathViolation for {bad}, got {:?}", other),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), sandbox.workspace(Environment::Dev).join("link"))
            .unwrap();

        let err = sandbox.resolve(Environment::Dev, "link/file.txt").unwrap_err();
        assert!(matches!(err, TrustError::PathViolation { .. }));
    }
}
