//! Per-instance checkpoint log.
//!
//! One JSON document per worktree records every phase transition the
//! instance has made. It is the source of truth for resume: the registry
//! says *which* tasks are in progress, the checkpoint log says *where*
//! each one stopped.
//!
//! Two hard rules:
//! - appends are all-or-nothing (write to a sibling temp file, fsync,
//!   rename), so a crash never leaves a half-written entry behind;
//! - a structurally invalid document is `CorruptState`, never "start
//!   fresh" — a missing file is the only fresh start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::EngineError;
use crate::phase::{CANONICAL_ORDER, Phase};

/// Status of one checkpoint entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
}

/// One appended transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointEntry {
    pub step: String,
    pub status: StepStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Fields written by newer versions survive a rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from_step: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The persisted checkpoint document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDoc {
    #[serde(default)]
    pub steps: Vec<CheckpointEntry>,
    #[serde(default)]
    pub workflow: WorkflowMeta,
    #[serde(default)]
    pub resume: ResumeMeta,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CheckpointDoc {
    pub fn last_step(&self) -> Option<&CheckpointEntry> {
        self.steps.last()
    }

    /// How many times each phase was started. Drives retry accounting
    /// after a resume.
    pub fn attempt_count(&self, phase: Phase) -> u32 {
        self.steps
            .iter()
            .filter(|e| e.step == phase.as_str() && e.status == StepStatus::Started)
            .count() as u32
    }

    /// Result payload of the most recent completed entry for `phase`.
    pub fn last_result(&self, phase: Phase) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|e| e.step == phase.as_str() && e.status == StepStatus::Completed)
            .and_then(|e| e.result.as_deref())
    }

    /// Terminal outcome recorded on the workflow, if any.
    pub fn outcome(&self) -> Option<crate::phase::Outcome> {
        self.workflow
            .extra
            .get("outcome")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The phase the machine should execute next, derived from the last
    /// entry via the fixed step→phase table. `None` means the sequence is
    /// complete.
    pub fn next_phase(&self) -> Result<Option<Phase>, EngineError> {
        match self.last_step() {
            None => Ok(Some(CANONICAL_ORDER[0])),
            Some(entry) => {
                crate::phase::resume_phase(&entry.step, entry.status == StepStatus::Completed)
            }
        }
    }

    /// Enforce the completed-prefix invariant.
    ///
    /// Replays every completed entry against a cursor into the canonical
    /// order: an entry may complete the phase at the cursor (advance) or
    /// re-complete an earlier phase (the bounded backward route), but may
    /// never complete a phase ahead of the cursor.
    fn validate(&self, path: &Path) -> Result<(), EngineError> {
        let corrupt = |reason: String| EngineError::CorruptState {
            path: path.to_path_buf(),
            reason,
        };

        let mut cursor = 0usize;
        for entry in &self.steps {
            let phase = Phase::parse_step(&entry.step).map_err(|_| {
                corrupt(format!("unknown step name {:?}", entry.step))
            })?;
            if entry.status != StepStatus::Completed {
                continue;
            }
            let idx = phase.index();
            if idx > cursor {
                return Err(corrupt(format!(
                    "step {:?} completed before its predecessor {:?}",
                    entry.step,
                    CANONICAL_ORDER[cursor].as_str()
                )));
            }
            cursor = idx + 1;
        }
        Ok(())
    }
}

/// Handle on one instance's checkpoint file.
pub struct CheckpointLog {
    path: PathBuf,
}

impl CheckpointLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the document. A missing file is an empty log;
    /// anything unreadable or structurally invalid is `CorruptState`.
    pub fn load(&self) -> Result<CheckpointDoc, EngineError> {
        if !self.path.exists() {
            return Ok(CheckpointDoc::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })?;
        let doc: CheckpointDoc =
            serde_json::from_str(&content).map_err(|e| EngineError::CorruptState {
                path: self.path.clone(),
                reason: format!("invalid checkpoint JSON: {e}"),
            })?;
        doc.validate(&self.path)?;
        Ok(doc)
    }

    /// Append one transition entry and persist atomically.
    pub fn append_step(
        &self,
        phase: Phase,
        status: StepStatus,
        result: Option<String>,
    ) -> Result<(), EngineError> {
        let mut doc = self.load()?;
        let now = Utc::now();
        doc.steps.push(CheckpointEntry {
            step: phase.as_str().to_string(),
            status,
            at: now,
            result,
            extra: serde_json::Map::new(),
        });
        doc.workflow.last_activity_at = Some(now);
        doc.workflow.current_phase = Some(phase.as_str().to_string());
        doc.resume.resume_from_step = doc.next_phase()?.map(|p| p.as_str().to_string());

        tracing::debug!(step = %phase, ?status, "checkpoint appended");
        self.write_atomic(&doc)
    }

    /// Record the terminal outcome without touching the step history.
    pub fn record_outcome(&self, outcome: crate::phase::Outcome) -> Result<(), EngineError> {
        let mut doc = self.load()?;
        let value = serde_json::to_value(outcome)
            .map_err(|e| anyhow::anyhow!("failed to serialize outcome: {e}"))?;
        doc.workflow.extra.insert("outcome".to_string(), value);
        doc.workflow.last_activity_at = Some(Utc::now());
        self.write_atomic(&doc)
    }

    /// Write-temp-then-rename so a crash mid-write leaves the previous
    /// document intact.
    fn write_atomic(&self, doc: &CheckpointDoc) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| anyhow::anyhow!("failed to serialize checkpoint: {e}"))?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |path: &Path, source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}
