//! Directory-backed `SnapshotStore`.
//!
//! Layout under the store directory:
//!
//! ```text
//! <dir>/<run-id>/manifest.json      path → state, file entries name a blob
//! <dir>/<run-id>/blobs/<sha256>     file contents, content-addressed
//! ```
//!
//! A capture is written to `<dir>/.staging-<run-id>/` and renamed into
//! place, so a stored snapshot is always complete.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use trustgate_contracts::{
    action::Environment,
    error::{TrustError, TrustResult},
    plan::RunId,
    snapshot::{CapturedState, RestoreReport, Snapshot},
};
use trustgate_core::{sandbox::Sandbox, traits::SnapshotStore};

use crate::capture::capture_paths;
use crate::restore::restore_snapshot;

const MANIFEST: &str = "manifest.json";
const BLOBS: &str = "blobs";

// ── On-disk manifest ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum ManifestEntry {
    File { blob: String, size: usize },
    Directory,
    Absent,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    run_id: RunId,
    environment: Environment,
    created_at: DateTime<Utc>,
    entries: BTreeMap<String, ManifestEntry>,
}

/// One line of `DirSnapshotStore::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub run_id: RunId,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub entries: usize,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Stores one snapshot directory per run.
#[derive(Debug, Clone)]
pub struct DirSnapshotStore {
    dir: PathBuf,
}

impl DirSnapshotStore {
    /// Use (creating if needed) `dir` as the snapshot directory.
    pub fn open(dir: impl AsRef<Path>) -> TrustResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run_dir(&self, run_id: RunId) -> PathBuf {
        self.dir.join(run_id.to_string())
    }

    /// Every stored snapshot, oldest first.
    ///
    /// Directories without a readable manifest are skipped with a warning.
    pub fn list(&self) -> TrustResult<Vec<SnapshotSummary>> {
        let mut summaries = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            match read_manifest(&entry.path()) {
                Ok(manifest) => summaries.push(SnapshotSummary {
                    run_id: manifest.run_id,
                    environment: manifest.environment,
                    created_at: manifest.created_at,
                    entries: manifest.entries.len(),
                }),
                Err(err) => warn!(dir = %name, error = %err, "skipping unreadable snapshot"),
            }
        }

        summaries.sort_by_key(|s| s.created_at);
        Ok(summaries)
    }

    fn persist(&self, snapshot: &Snapshot) -> TrustResult<()> {
        let staging = self.dir.join(format!(".staging-{}", snapshot.run_id));
        let result = self.write_staged(&staging, snapshot);
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }

    fn write_staged(&self, staging: &Path, snapshot: &Snapshot) -> TrustResult<()> {
        let failed = |path: &Path, e: std::io::Error| TrustError::Snapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if staging.exists() {
            fs::remove_dir_all(staging).map_err(|e| failed(staging, e))?;
        }
        let blobs = staging.join(BLOBS);
        fs::create_dir_all(&blobs).map_err(|e| failed(&blobs, e))?;

        let mut entries = BTreeMap::new();
        for (path, state) in &snapshot.entries {
            let entry = match state {
                CapturedState::File(bytes) => {
                    let blob = hex::encode(Sha256::digest(bytes));
                    let blob_path = blobs.join(&blob);
                    if !blob_path.exists() {
                        fs::write(&blob_path, bytes).map_err(|e| failed(&blob_path, e))?;
                    }
                    ManifestEntry::File { blob, size: bytes.len() }
                }
                CapturedState::Directory => ManifestEntry::Directory,
                CapturedState::Absent => ManifestEntry::Absent,
            };
            entries.insert(path.clone(), entry);
        }

        let manifest = Manifest {
            run_id: snapshot.run_id,
            environment: snapshot.environment,
            created_at: snapshot.created_at,
            entries,
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| TrustError::Snapshot {
            path: MANIFEST.to_string(),
            reason: e.to_string(),
        })?;
        let manifest_path = staging.join(MANIFEST);
        fs::write(&manifest_path, json).map_err(|e| failed(&manifest_path, e))?;

        let target = self.run_dir(snapshot.run_id);
        if target.exists() {
            return Err(already_captured(&target));
        }
        fs::rename(staging, &target).map_err(|e| failed(&target, e))
    }
}

impl SnapshotStore for DirSnapshotStore {
    fn capture(
        &self,
        run_id: RunId,
        sandbox: &Sandbox,
        environment: Environment,
        paths: &[&str],
    ) -> TrustResult<Snapshot> {
        // A stored snapshot is the only record of pre-run state; never replace it.
        let target = self.run_dir(run_id);
        if target.exists() {
            warn!(run_id = %run_id, "snapshot already stored for run");
            return Err(already_captured(&target));
        }
        let snapshot = capture_paths(run_id, sandbox, environment, paths)?;
        self.persist(&snapshot)?;
        info!(
            run_id = %run_id,
            environment = %environment,
            entries = snapshot.entries.len(),
            "snapshot stored"
        );
        Ok(snapshot)
    }

    fn restore(&self, run_id: RunId, sandbox: &Sandbox) -> TrustResult<RestoreReport> {
        let snapshot = self.load(run_id)?;
        restore_snapshot(&snapshot, sandbox)
    }

    fn load(&self, run_id: RunId) -> TrustResult<Snapshot> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.is_dir() {
            return Err(TrustError::NotFound {
                action_index: None,
                what: format!("snapshot for run {}", run_id),
            });
        }
        let manifest = read_manifest(&run_dir)?;

        let mut snapshot = Snapshot::new(manifest.run_id, manifest.environment);
        snapshot.created_at = manifest.created_at;
        for (path, entry) in manifest.entries {
            let state = match entry {
                ManifestEntry::File { blob, .. } => {
                    let blob_path = run_dir.join(BLOBS).join(&blob);
                    let bytes = fs::read(&blob_path).map_err(|e| TrustError::Snapshot {
                        path: path.clone(),
                        reason: format!("missing blob {}: {}", blob, e),
                    })?;
                    if hex::encode(Sha256::digest(&bytes)) != blob {
                        return Err(TrustError::Snapshot {
                            path,
                            reason: format!("blob {} is corrupt", blob),
                        });
                    }
                    CapturedState::File(bytes)
                }
                ManifestEntry::Directory => CapturedState::Directory,
                ManifestEntry::Absent => CapturedState::Absent,
            };
            snapshot.entries.insert(path, state);
        }
        Ok(snapshot)
    }

    fn prune(&self, run_id: RunId) -> TrustResult<()> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.is_dir() {
            return Err(TrustError::NotFound {
                action_index: None,
                what: format!("snapshot for run {}", run_id),
            });
        }
        fs::remove_dir_all(&run_dir).map_err(|e| io_error(&run_dir, e))?;
        info!(run_id = %run_id, "snapshot pruned");
        Ok(())
    }
}

fn read_manifest(run_dir: &Path) -> TrustResult<Manifest> {
    let path = run_dir.join(MANIFEST);
    let bytes = fs::read(&path).map_err(|e| TrustError::Snapshot {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| TrustError::Snapshot {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn already_captured(run_dir: &Path) -> TrustError {
    TrustError::Conflict {
        action_index: None,
        path: run_dir.display().to_string(),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TrustError {
    TrustError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
