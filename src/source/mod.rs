//! Task source adapters.
//!
//! Each backend returns its own loosely-typed records; adapters normalize
//! them into the canonical `Task` shape at this boundary so the core never
//! sees source-specific fields. Network and subprocess failures are mapped
//! to `EngineError::SourceUnavailable` here.

pub mod custom;
pub mod github;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::task::{Task, TaskSourceSpec};

/// A pending change already associated with a task somewhere else (an open
/// pull request, typically). Input to the in-flight heuristic.
#[derive(Debug, Clone)]
pub struct ChangeRef {
    pub branch: String,
    pub title: String,
    pub description: String,
}

/// Uniform fetch interface over heterogeneous backends.
#[async_trait]
pub trait TaskSourceAdapter: Send + Sync {
    /// Fetch candidate tasks. Records must carry at least id, title,
    /// labels, and created_at.
    async fn fetch(&self) -> Result<Vec<Task>, EngineError>;

    /// Open changes for the in-flight heuristic. Advisory: adapters that
    /// cannot enumerate changes return an empty list.
    async fn open_changes(&self) -> Result<Vec<ChangeRef>, EngineError> {
        Ok(Vec::new())
    }
}

/// Build the adapter for a source spec.
pub fn adapter_for(spec: &TaskSourceSpec) -> Result<Box<dyn TaskSourceAdapter>, EngineError> {
    match spec {
        TaskSourceSpec::Fixed { reference } => {
            Ok(Box::new(github::GithubSource::from_env(reference)?))
        }
        TaskSourceSpec::CustomTool { command, .. } => {
            Ok(Box::new(custom::CustomToolSource::new(command.clone())))
        }
        TaskSourceSpec::Other { description } => Err(EngineError::SourceUnavailable(format!(
            "free-text source {description:?} has no fetch backend; \
             pick a fixed repository or a custom tool"
        ))),
    }
}
