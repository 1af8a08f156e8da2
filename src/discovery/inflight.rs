//! In-flight detection.
//!
//! Best-effort, advisory only: registry exclusion is the sole hard
//! guarantee against double work. The string heuristic here may both
//! over- and under-match, so it sits behind a trait; an exact
//! cross-reference can replace it without touching the ranking pipeline
//! or the state machine.

use regex::Regex;
use std::collections::HashSet;

use crate::source::ChangeRef;
use crate::task::Task;

/// Detects whether a task already has an associated pending change.
pub trait InFlightDetector: Send + Sync {
    fn is_in_flight(&self, task_id: &str, changes: &[ChangeRef]) -> bool;
}

/// Heuristic matcher over branch names, titles, and descriptions.
#[derive(Debug, Default)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    fn closing_keyword_re(task_id: &str) -> Option<Regex> {
        // Word-bounded "closes #42" / "fixes #42" / "resolves #42".
        let pattern = format!(
            r"(?i)\b(closes|fixes|resolves)\s+#{}\b",
            regex::escape(task_id)
        );
        Regex::new(&pattern).ok()
    }
}

impl InFlightDetector for HeuristicDetector {
    fn is_in_flight(&self, task_id: &str, changes: &[ChangeRef]) -> bool {
        let branch_suffix = format!("-{task_id}");
        let title_marker = format!("(#{task_id})");
        let closing = Self::closing_keyword_re(task_id);

        changes.iter().any(|change| {
            change.branch.ends_with(&branch_suffix)
                || change.title.contains(&title_marker)
                || closing
                    .as_ref()
                    .is_some_and(|re| re.is_match(&change.description))
        })
    }
}

/// Ids of all candidates that look in flight.
pub fn in_flight_ids(
    detector: &dyn InFlightDetector,
    candidates: &[Task],
    changes: &[ChangeRef],
) -> HashSet<String> {
    candidates
        .iter()
        .filter(|t| detector.is_in_flight(&t.id, changes))
        .map(|t| t.id.clone())
        .collect()
}
