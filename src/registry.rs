//! Shared claim registry.
//!
//! One JSON document at the repository root records which tasks are
//! currently owned by a live instance. It is the only mutable state shared
//! across instances, which run as separate OS processes, so every mutation
//! takes an exclusive `fs2` lock on a sibling lock file and performs a
//! serialized read-modify-write. At most one claim exists per
//! (source, id) at any time.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::EngineError;

/// Exclusive ownership of one task by one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub id: String,
    pub source: String,
    pub instance: Uuid,
    pub worktree: PathBuf,
    pub branch: String,
    pub claimed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    tasks: Vec<ClaimRecord>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Handle on the shared registry document.
pub struct Registry {
    path: PathBuf,
    lock_path: PathBuf,
}

impl Registry {
    pub fn new(path: PathBuf) -> Self {
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Claim (source, id) for `record.instance`. Fails with
    /// `AlreadyClaimed` if any live instance holds it, whether or not that
    /// instance is this process.
    pub fn claim(&self, record: ClaimRecord) -> Result<(), EngineError> {
        let _guard = self.lock_exclusive()?;
        let mut doc = self.read_doc()?;

        if let Some(existing) = doc
            .tasks
            .iter()
            .find(|c| c.id == record.id && c.source == record.source)
        {
            return Err(EngineError::AlreadyClaimed {
                id: existing.id.clone(),
                source_name: existing.source.clone(),
                worktree: existing.worktree.clone(),
            });
        }

        tracing::info!(id = %record.id, source = %record.source, "claiming task");
        doc.tasks.push(record);
        self.write_doc(&doc)
    }

    /// Drop the claim for (source, id). Releasing a claim that does not
    /// exist is a no-op; termination paths must be idempotent.
    pub fn release(&self, id: &str, source: &str) -> Result<(), EngineError> {
        let _guard = self.lock_exclusive()?;
        let mut doc = self.read_doc()?;
        let before = doc.tasks.len();
        doc.tasks.retain(|c| !(c.id == id && c.source == source));
        if doc.tasks.len() != before {
            tracing::info!(id, source, "released claim");
        }
        self.write_doc(&doc)
    }

    pub fn list(&self) -> Result<Vec<ClaimRecord>, EngineError> {
        let _guard = self.lock_exclusive()?;
        Ok(self.read_doc()?.tasks)
    }

    /// Resolve a resume argument to a single live claim.
    ///
    /// Precedence is explicit: exact task id, then branch (exact or
    /// suffix) match, then literal worktree path existence. With no
    /// argument the single live claim wins; with several, resolution
    /// fails rather than guessing among live instances.
    pub fn resolve(&self, arg: Option<&str>) -> Result<ClaimRecord, EngineError> {
        let claims = self.list()?;

        let Some(arg) = arg else {
            return match claims.len() {
                0 => Err(anyhow::anyhow!("no active claims to resume").into()),
                1 => Ok(claims.into_iter().next().unwrap_or_else(|| unreachable!())),
                _ => Err(EngineError::AmbiguousResume {
                    candidates: claims.iter().map(|c| c.id.clone()).collect(),
                }),
            };
        };

        if let Some(hit) = claims.iter().find(|c| c.id == arg) {
            return Ok(hit.clone());
        }

        let branch_hits: Vec<&ClaimRecord> = claims
            .iter()
            .filter(|c| c.branch == arg || c.branch.ends_with(arg))
            .collect();
        match branch_hits.len() {
            1 => return Ok(branch_hits[0].clone()),
            n if n > 1 => {
                return Err(EngineError::AmbiguousResume {
                    candidates: branch_hits.iter().map(|c| c.id.clone()).collect(),
                });
            }
            _ => {}
        }

        if let Some(hit) = claims
            .iter()
            .find(|c| c.worktree == Path::new(arg) && c.worktree.exists())
        {
            return Ok(hit.clone());
        }

        Err(anyhow::anyhow!(
            "no active claim matches {arg:?} (tried id, branch, path)"
        )
        .into())
    }

    /// Take the exclusive cross-process lock. Held for the duration of one
    /// read-modify-write; released when the returned file drops.
    fn lock_exclusive(&self) -> Result<fs::File, EngineError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|source| EngineError::Io {
                path: self.lock_path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| EngineError::Io {
            path: self.lock_path.clone(),
            source,
        })?;
        Ok(file)
    }

    fn read_doc(&self) -> Result<RegistryDoc, EngineError> {
        if !self.path.exists() {
            return Ok(RegistryDoc::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| EngineError::CorruptState {
            path: self.path.clone(),
            reason: format!("invalid registry JSON: {e}"),
        })
    }

    fn write_doc(&self, doc: &RegistryDoc) -> Result<(), EngineError> {
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| anyhow::anyhow!("failed to serialize registry: {e}"))?;
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

/// Build a ClaimRecord for a new instance.
pub fn new_claim(
    id: &str,
    source: &str,
    worktree: PathBuf,
    branch: String,
) -> ClaimRecord {
    ClaimRecord {
        id: id.to_string(),
        source: source.to_string(),
        instance: Uuid::new_v4(),
        worktree,
        branch,
        claimed_at: Utc::now(),
        extra: serde_json::Map::new(),
    }
}
