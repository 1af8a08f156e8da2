//! Domain types: tasks, sources, and the per-instance policy.
//!
//! Source backends return loosely-typed records; the adapter boundary
//! normalizes them into the one canonical `Task` shape the core sees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of backend a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Github,
    CustomTool,
    Other,
}

/// A normalized unit of work. Immutable once fetched; `score` is the only
/// locally derived field and is filled in by the ranking pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within its source.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Opaque reference back into the source (e.g. `acme/app` for GitHub).
    pub source: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub score: i64,
}

impl Task {
    /// Case-insensitive substring match against any label.
    pub fn has_label_containing(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.labels.iter().any(|l| l.to_lowercase().contains(&needle))
    }

    /// Age relative to `now`, in whole days.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// Where the instance should pull its work from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskSourceSpec {
    /// A fixed, well-known source such as a GitHub repository.
    Fixed { reference: String },
    /// An external command that emits candidate records.
    CustomTool { description: String, command: String },
    /// Free-text description the operator resolves by hand.
    Other { description: String },
}

/// Priority filter applied during discovery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityFilter {
    #[default]
    All,
    Bugs,
    Security,
    Features,
}

impl PriorityFilter {
    /// Keyword set matched against labels, substring and case-insensitive.
    /// `All` bypasses filtering entirely.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            PriorityFilter::All => &[],
            PriorityFilter::Bugs => &["bug", "defect", "regression", "crash"],
            PriorityFilter::Security => &["security", "vulnerability", "cve"],
            PriorityFilter::Features => &["feature", "enhancement", "request"],
        }
    }
}

/// How far the instance should take the work before stopping.
/// Ordinal: each variant includes everything before it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum StoppingPoint {
    Implemented,
    #[default]
    PrCreated,
    Merged,
    Deployed,
    Production,
}

/// Selection-time policy for one instance. Set once, immutable, persisted
/// in the checkpoint document so a resumed run sees the same choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub task_source: TaskSourceSpec,
    #[serde(default)]
    pub priority_filter: PriorityFilter,
    #[serde(default)]
    pub stopping_point: StoppingPoint,
}
