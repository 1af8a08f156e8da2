//! Runtime configuration.
//!
//! Bridges CLI flags and environment overrides into the paths and knobs
//! the engine uses. The shared state (registry, preferences) lives under
//! `.drydock/` at the repository root; per-instance state lives under
//! `.drydock/` inside each worktree.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_REVIEW_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_VALIDATION_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub drydock_dir: PathBuf,
    pub registry_path: PathBuf,
    pub prefs_path: PathBuf,
    pub log_dir: PathBuf,
    /// Command spawned for worker phases.
    pub worker_cmd: String,
    /// Review loop budget; exceeding it is fatal.
    pub review_max_iterations: u32,
    /// How many times delivery-validation may route back to
    /// implementation before giving up.
    pub validation_max_attempts: u32,
    pub verbose: bool,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let drydock_dir = project_dir.join(".drydock");

        let worker_cmd =
            std::env::var("DRYDOCK_WORKER_CMD").unwrap_or_else(|_| "claude".to_string());
        let review_max_iterations = std::env::var("DRYDOCK_REVIEW_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REVIEW_MAX_ITERATIONS);
        let validation_max_attempts = std::env::var("DRYDOCK_VALIDATION_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_VALIDATION_MAX_ATTEMPTS);

        Ok(Self {
            registry_path: drydock_dir.join("registry.json"),
            prefs_path: drydock_dir.join("prefs.json"),
            log_dir: drydock_dir.join("logs"),
            project_dir,
            drydock_dir,
            worker_cmd,
            review_max_iterations,
            validation_max_attempts,
            verbose,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.drydock_dir).context("Failed to create .drydock directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Checkpoint document location inside a worktree.
    pub fn checkpoint_path(worktree: &Path) -> PathBuf {
        worktree.join(".drydock").join("checkpoint.json")
    }
}
