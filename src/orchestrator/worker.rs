//! External worker invocation.
//!
//! Workers are opaque executors: the machine hands one a phase input,
//! blocks until it finishes, and records the outcome. The stock
//! implementation spawns a configured command with the input document on
//! stdin; anything that satisfies `ExternalWorker` can stand in for it,
//! which is how the tests drive the machine without subprocesses.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::EngineError;
use crate::phase::Phase;
use crate::task::{Policy, Task};

/// Everything a worker gets to see for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseInput {
    pub phase: Phase,
    /// Set for the pre-review sub-steps ("cleanup" / "coverage").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_step: Option<String>,
    pub iteration: u32,
    pub task: Task,
    pub policy: Policy,
    pub worktree: PathBuf,
    /// Structured findings from a failed delivery validation, fed back
    /// into the implementation retry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub status: WorkerStatus,
    pub result: Option<String>,
}

#[async_trait]
pub trait ExternalWorker: Send + Sync {
    /// Run one phase to completion. Blocking from the machine's view;
    /// may itself be long-running. A worker-level failure is a normal
    /// outcome, not an `Err` — `Err` is reserved for not being able to
    /// invoke the worker at all.
    async fn run(&self, input: &PhaseInput) -> Result<WorkerOutcome, EngineError>;
}

/// Spawns `worker_cmd <phase-slug>` in the worktree with the input
/// document on stdin. Exit code zero is completion; stdout is the result.
pub struct ProcessWorker {
    worker_cmd: String,
    log_dir: PathBuf,
}

impl ProcessWorker {
    pub fn new(worker_cmd: String, log_dir: PathBuf) -> Self {
        Self {
            worker_cmd,
            log_dir,
        }
    }

    fn output_log_path(&self, input: &PhaseInput) -> PathBuf {
        self.log_dir.join(format!(
            "phase-{}-iter-{}-output.log",
            input.phase, input.iteration
        ))
    }
}

#[async_trait]
impl ExternalWorker for ProcessWorker {
    async fn run(&self, input: &PhaseInput) -> Result<WorkerOutcome, EngineError> {
        let payload = serde_json::to_string_pretty(input)
            .map_err(|e| anyhow::anyhow!("failed to serialize phase input: {e}"))?;

        let mut child = Command::new(&self.worker_cmd)
            .arg(input.phase.as_str())
            .current_dir(&input.worktree)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::WorkerFailed {
                    phase: input.phase,
                    message: format!("failed to spawn {:?}: {e}", self.worker_cmd),
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| anyhow::anyhow!("failed to write worker stdin: {e}"))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| anyhow::anyhow!("failed to close worker stdin: {e}"))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| anyhow::anyhow!("failed to await worker: {e}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if let Err(e) = std::fs::create_dir_all(&self.log_dir)
            .and_then(|_| std::fs::write(self.output_log_path(input), &stdout))
        {
            tracing::warn!(error = %e, "could not write worker output log");
        }

        if output.status.success() {
            Ok(WorkerOutcome {
                status: WorkerStatus::Completed,
                result: Some(stdout),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            Ok(WorkerOutcome {
                status: WorkerStatus::Failed,
                result: Some(message),
            })
        }
    }
}
