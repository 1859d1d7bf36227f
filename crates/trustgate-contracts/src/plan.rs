//! Plan and run identity types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{Action, Environment};

/// Unique identifier for one submitted plan and everything that happens
/// to it afterwards (scoring, approval, snapshot, execution).
///
/// Appears in every audit record and names the run's snapshot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// An ordered batch of actions submitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub run_id: RunId,
    /// The environment every action in the plan targets.
    pub environment: Environment,
    /// Actions in submission order; `actions[i].index == i`.
    pub actions: Vec<Action>,
    /// What the agent says it is trying to do. Free text, for the record only.
    pub task: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Build a plan with a fresh run ID stamped now.
    pub fn new(environment: Environment, actions: Vec<Action>, task: Option<String>) -> Self {
        Self {
            run_id: RunId::new(),
            environment,
            actions,
            task,
            created_at: Utc::now(),
        }
    }

    /// Every distinct path the plan references, in first-seen order.
    ///
    /// Includes both sides of a `move`.
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for path in self.actions.iter().flat_map(|a| a.paths.iter()) {
            if !seen.contains(&path.as_str()) {
                seen.push(path.as_str());
            }
        }
        seen
    }
}
