//! Command-backed task source.
//!
//! Runs an operator-supplied command and reads one JSON task record per
//! stdout line. Records are normalized into the canonical `Task` shape;
//! lines that are not valid records fail the fetch rather than being
//! silently dropped, since a half-parsed backlog is worse than none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;

use super::TaskSourceAdapter;
use crate::errors::EngineError;
use crate::task::{SourceKind, Task};

/// Minimum record shape a custom tool must emit per line.
#[derive(Debug, Deserialize)]
struct CustomRecord {
    id: String,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    labels: Vec<String>,
    created_at: DateTime<Utc>,
}

pub struct CustomToolSource {
    command: String,
}

impl CustomToolSource {
    pub fn new(command: String) -> Self {
        Self { command }
    }

    pub fn source_ref(&self) -> String {
        format!("custom:{}", self.command)
    }

    fn parse_output(&self, stdout: &str) -> Result<Vec<Task>, EngineError> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let record: CustomRecord = serde_json::from_str(line).map_err(|e| {
                    EngineError::SourceUnavailable(format!(
                        "custom tool emitted an invalid record: {e}"
                    ))
                })?;
                Ok(Task {
                    id: record.id,
                    title: record.title,
                    body: record.body,
                    labels: record.labels,
                    created_at: record.created_at,
                    source: self.source_ref(),
                    kind: SourceKind::CustomTool,
                    score: 0,
                })
            })
            .collect()
    }
}

#[async_trait]
impl TaskSourceAdapter for CustomToolSource {
    async fn fetch(&self) -> Result<Vec<Task>, EngineError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .await
            .map_err(|e| {
                EngineError::SourceUnavailable(format!(
                    "failed to run custom tool {:?}: {e}",
                    self.command
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::SourceUnavailable(format!(
                "custom tool {:?} exited with {}: {}",
                self.command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_output(&stdout)
    }
}
