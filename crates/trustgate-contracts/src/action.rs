//! Action and environment types.
//!
//! An `Action` is one whitelisted file operation parsed from an agent plan.
//! Actions are immutable once the parser produces them; everything
//! downstream (scorer, gate, executor, snapshot) only reads them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of file operations an agent plan may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Create or overwrite a file.
    Write,
    /// Create a file or append to an existing one.
    Append,
    /// Remove an existing file.
    DeleteFile,
    /// Relocate a file or directory.
    Move,
    /// Create a directory and its parents.
    MakeDir,
}

impl ActionKind {
    /// Every kind, in DSL declaration order.
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Write,
        ActionKind::Append,
        ActionKind::DeleteFile,
        ActionKind::Move,
        ActionKind::MakeDir,
    ];

    /// The DSL keyword for this kind (e.g. `delete_file`).
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Write => "write",
            ActionKind::Append => "append",
            ActionKind::DeleteFile => "delete_file",
            ActionKind::Move => "move",
            ActionKind::MakeDir => "make_dir",
        }
    }

    /// Look up a kind by its DSL keyword. Matching is exact.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == keyword)
    }

    /// True for the kinds whose DSL form is `<kind> <path> | <content>`.
    pub fn takes_content(self) -> bool {
        matches!(self, ActionKind::Write | ActionKind::Append)
    }

    /// Number of path arguments the DSL form requires.
    pub fn path_arity(self) -> usize {
        match self {
            ActionKind::Move => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| format!("unknown action kind '{}'", s))
    }
}

/// A target environment. Each one maps to its own workspace directory
/// under the sandbox root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown environment '{}'", s))
    }
}

/// One parsed plan line.
///
/// `paths` holds one entry for every kind except `move`, which holds
/// `[source, destination]`. `content` is present only for `write` and
/// `append`. Paths are relative to the environment's workspace and have
/// already passed the parser's lexical sandbox check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Zero-based position within the plan.
    pub index: usize,
    /// One-based line number in the submitted text.
    pub line: usize,
    pub kind: ActionKind,
    pub environment: Environment,
    pub paths: Vec<String>,
    pub content: Option<String>,
    /// The trimmed source line, kept for reports.
    pub raw: String,
}

impl Action {
    /// The first path argument (the only one for single-path kinds).
    pub fn primary_path(&self) -> &str {
        self.paths.first().map(String::as_str).unwrap_or_default()
    }

    /// The destination of a `move`; `None` for every other kind.
    pub fn destination(&self) -> Option<&str> {
        match self.kind {
            ActionKind::Move => self.paths.get(1).map(String::as_str),
            _ => None,
        }
    }

    /// Text the risk scorer scans: every path followed by the content.
    pub fn scan_targets(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .map(String::as_str)
            .chain(self.content.as_deref())
    }
}
