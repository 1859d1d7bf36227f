//! The plan DSL parser.
//!
//! One action per line:
//!
//! ```text
//! write releases/notes.md | Release v1.2 notes
//! append README.md | Added release instructions
//! make_dir releases/2025-08-29
//! move tmp/output.txt reports/output.txt
//! delete_file old/legacy.sql
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Parsing is all or
//! nothing: the first bad line rejects the whole submission.

use tracing::debug;

use trustgate_contracts::{
    action::{Action, ActionKind, Environment},
    error::{TrustError, TrustResult},
};

use crate::sandbox::normalize_relative;

const SEPARATOR: char = '|';

/// Parse `text` into the ordered actions of a plan targeting `environment`.
///
/// # Errors
///
/// - `Parse` for an unknown kind, a missing or unexpected `|`, the wrong
///   number of paths, an empty path, or a plan with no actions at all.
/// - `PathViolation` for a path that is absolute or climbs out of the
///   workspace.
pub fn parse_plan(text: &str, environment: Environment) -> TrustResult<Vec<Action>> {
    let mut actions = Vec::new();

    for (offset, raw_line) in text.lines().enumerate() {
        let line_no = offset + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let action = parse_line(line, line_no, actions.len(), environment)?;
        actions.push(action);
    }

    if actions.is_empty() {
        return Err(TrustError::Parse {
            line: 0,
            reason: "plan contains no actions".to_string(),
        });
    }

    debug!(environment = %environment, actions = actions.len(), "plan parsed");
    Ok(actions)
}

fn parse_line(
    line: &str,
    line_no: usize,
    index: usize,
    environment: Environment,
) -> TrustResult<Action> {
    let parse_err = |reason: String| TrustError::Parse { line: line_no, reason };

    let (head, content) = match line.split_once(SEPARATOR) {
        Some((head, tail)) => (head, Some(tail.trim().to_string())),
        None => (line, None),
    };

    let mut tokens = head.split_whitespace();
    let keyword = tokens.next().unwrap_or_default();
    let kind = ActionKind::from_keyword(keyword)
        .ok_or_else(|| parse_err(format!("unknown action kind '{}'", keyword)))?;
    let args: Vec<&str> = tokens.collect();

    match (kind.takes_content(), content.is_some()) {
        (true, false) => {
            return Err(parse_err(format!(
                "'{}' requires '<path> {} <content>'",
                kind, SEPARATOR
            )))
        }
        (false, true) => {
            return Err(parse_err(format!(
                "'{}' does not take content; unexpected '{}'",
                kind, SEPARATOR
            )))
        }
        _ => {}
    }

    if args.is_empty() {
        return Err(parse_err(format!("'{}' is missing its path (empty path)", kind)));
    }
    if args.len() != kind.path_arity() {
        return Err(parse_err(format!(
            "'{}' takes {} path(s), got {}",
            kind,
            kind.path_arity(),
            args.len()
        )));
    }

    let mut paths = Vec::with_capacity(args.len());
    for arg in args {
        let normalized = normalize_relative(arg).ok_or_else(|| TrustError::PathViolation {
            line: Some(line_no),
            path: arg.to_string(),
        })?;
        if normalized.is_empty() {
            return Err(parse_err(format!("empty path '{}' names the workspace root", arg)));
        }
        paths.push(normalized);
    }

    Ok(Action {
        index,
        line: line_no,
        kind,
        environment,
        paths,
        content,
        raw: line.to_string(),
    })
}
