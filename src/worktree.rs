//! Worktree provisioning.
//!
//! Each instance works on its own git worktree and branch, so file-level
//! conflicts between instances cannot occur. The worktree lives under
//! `.drydock/worktrees/` next to the main checkout and is named after the
//! task.

use anyhow::{Context, Result};
use git2::{Repository, WorktreeAddOptions};
use std::path::{Path, PathBuf};

use crate::task::Task;

const BRANCH_SLUG_LEN: usize = 40;

/// Lowercase, alphanumeric-and-dash slug bounded to `max_len` bytes.
pub fn slugify(title: &str, max_len: usize) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.len() > max_len {
        let mut cut = max_len;
        while cut > 0 && !slug.is_char_boundary(cut) {
            cut -= 1;
        }
        slug[..cut].trim_end_matches('-').to_string()
    } else {
        slug
    }
}

/// Branch name for a task: `drydock/<kind>-<id>-<slug>`.
pub fn branch_name(task: &Task) -> String {
    let kind = match task.kind {
        crate::task::SourceKind::Github => "github",
        crate::task::SourceKind::CustomTool => "custom",
        crate::task::SourceKind::Other => "other",
    };
    format!(
        "drydock/{kind}-{}-{}",
        task.id,
        slugify(&task.title, BRANCH_SLUG_LEN)
    )
}

/// Where the worktree for a task will live. Deterministic so a claim can
/// be registered before the worktree is provisioned.
pub fn planned_path(repo_root: &Path, task_id: &str) -> PathBuf {
    repo_root
        .join(".drydock")
        .join("worktrees")
        .join(format!("task-{task_id}"))
}

/// Create the branch and worktree for a task in `repo_root`.
/// Returns the worktree path.
pub fn setup(repo_root: &Path, task: &Task) -> Result<(PathBuf, String)> {
    let repo = Repository::open(repo_root).context("Failed to open git repository")?;
    let branch = branch_name(task);
    let worktree_dir = planned_path(repo_root, &task.id);

    std::fs::create_dir_all(worktree_dir.parent().unwrap_or(repo_root))
        .context("Failed to create worktrees directory")?;

    let head = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .context("Repository has no commits to branch from")?;

    let branch_ref = match repo.find_branch(&branch, git2::BranchType::Local) {
        Ok(existing) => existing,
        Err(_) => repo
            .branch(&branch, &head, false)
            .with_context(|| format!("Failed to create branch {branch}"))?,
    };
    let reference = branch_ref.into_reference();

    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repo.worktree(&format!("task-{}", task.id), &worktree_dir, Some(&opts))
        .with_context(|| format!("Failed to add worktree at {}", worktree_dir.display()))?;

    tracing::info!(branch = %branch, path = %worktree_dir.display(), "worktree ready");
    Ok((worktree_dir, branch))
}
