//! Candidate discovery and deterministic ranking.
//!
//! The pipeline excludes claimed and in-flight ids, filters by policy,
//! scores, and keeps the top five. Everything here is deterministic:
//! identical inputs produce identical output, and ties keep input order
//! (the sort is stable).

pub mod inflight;

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::errors::EngineError;
use crate::registry::Registry;
use crate::source::TaskSourceAdapter;
use crate::task::{Policy, PriorityFilter, Task};

/// Ranked output is truncated to this many candidates.
pub const MAX_RANKED: usize = 5;

const BUG_AGE_BONUS_DAYS: i64 = 30;

/// Score one task. Bonuses are additive.
pub fn score(task: &Task, now: DateTime<Utc>) -> i64 {
    let mut score = 0;
    if task.has_label_containing("critical") || task.has_label_containing("p0") {
        score += 100;
    }
    if task.has_label_containing("high") || task.has_label_containing("p1") {
        score += 50;
    }
    if task.has_label_containing("security") {
        score += 40;
    }
    if task.has_label_containing("small") || task.has_label_containing("quick") {
        score += 20;
    }
    if task.has_label_containing("bug") && task.age_days(now) > BUG_AGE_BONUS_DAYS {
        score += 10;
    }
    score
}

fn passes_filter(task: &Task, filter: PriorityFilter) -> bool {
    let keywords = filter.keywords();
    keywords.is_empty() || keywords.iter().any(|k| task.has_label_containing(k))
}

/// Rank candidates: exclude, filter, score, truncate.
pub fn rank(
    candidates: Vec<Task>,
    claimed: &HashSet<String>,
    in_flight: &HashSet<String>,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let mut ranked: Vec<Task> = candidates
        .into_iter()
        .filter(|t| !claimed.contains(&t.id) && !in_flight.contains(&t.id))
        .filter(|t| passes_filter(t, policy.priority_filter))
        .map(|mut t| {
            t.score = score(&t, now);
            t
        })
        .collect();

    // Stable sort keeps input order on equal scores.
    ranked.sort_by_key(|t| std::cmp::Reverse(t.score));
    ranked.truncate(MAX_RANKED);
    ranked
}

/// Full discovery pass: fetch candidates, probe for in-flight changes
/// (failing open), exclude claims from the registry, rank.
pub async fn discover(
    adapter: &dyn TaskSourceAdapter,
    registry: &Registry,
    policy: &Policy,
) -> Result<Vec<Task>, EngineError> {
    let candidates = adapter.fetch().await?;

    // The heuristic is advisory; an unreachable change source must not
    // block discovery.
    let changes = match adapter.open_changes().await {
        Ok(changes) => changes,
        Err(e) => {
            tracing::warn!(error = %e, "in-flight probe unavailable, proceeding without it");
            Vec::new()
        }
    };

    let detector = inflight::HeuristicDetector;
    let in_flight = inflight::in_flight_ids(&detector, &candidates, &changes);
    let claimed: HashSet<String> = registry
        .list()?
        .into_iter()
        .filter(|c| candidates.iter().any(|t| t.source == c.source))
        .map(|c| c.id)
        .collect();

    Ok(rank(candidates, &claimed, &in_flight, policy, Utc::now()))
}
