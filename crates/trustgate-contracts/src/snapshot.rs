//! Snapshot types.
//!
//! A snapshot records, for every path a plan may touch, what was there
//! before the run: file bytes, a directory, or nothing at all. Restoring a
//! snapshot puts each path back to exactly that state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Environment;
use crate::plan::RunId;

/// The pre-run state of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapturedState {
    File(Vec<u8>),
    Directory,
    Absent,
}

impl CapturedState {
    pub fn is_absent(&self) -> bool {
        matches!(self, CapturedState::Absent)
    }
}

/// Captured pre-execution state for one run.
///
/// Keys are workspace-relative paths using `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_id: RunId,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub entries: BTreeMap<String, CapturedState>,
}

impl Snapshot {
    pub fn new(run_id: RunId, environment: Environment) -> Self {
        Self {
            run_id,
            environment,
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// What a restore changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Paths whose bytes were rewritten.
    pub rewritten: Vec<String>,
    /// Directories recreated.
    pub recreated_dirs: Vec<String>,
    /// Paths removed because they did not exist before the run.
    pub removed: Vec<String>,
}
