//! Integration tests for Drydock
//!
//! These drive the compiled binary end to end against throwaway git
//! repositories, with a stub worker command standing in for the real one.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn drydock() -> Command {
    Command::cargo_bin("drydock").unwrap()
}

/// A temp directory holding a git repository with one commit.
fn create_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    fs::write(dir.path().join("README.md"), "# fixture\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("README.md")).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("test", "test@localhost").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();
    dir
}

/// A custom-tool command that emits one fixed task record.
fn task_source_cmd() -> String {
    r#"echo '{"id":"T-1","title":"Fix the fixture","labels":["bug"],"created_at":"2026-01-05T10:00:00Z"}'"#
        .to_string()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        drydock().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        drydock().arg("--version").assert().success();
    }

    #[test]
    fn test_config_prints_layout() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.json"))
            .stdout(predicate::str::contains("review budget"));
    }

    #[test]
    fn test_claims_empty() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .arg("claims")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active claims"));
    }

    #[test]
    fn test_status_empty() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active instances"));
    }

    #[test]
    fn test_resume_with_nothing_to_resume_fails() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .arg("resume")
            .assert()
            .failure()
            .stderr(predicate::str::contains("no active claims"));
    }
}

// =============================================================================
// Discovery
// =============================================================================

mod discovery {
    use super::*;

    #[test]
    fn test_next_ranks_custom_source() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .args(["next", "--custom", &task_source_cmd()])
            .assert()
            .success()
            .stdout(predicate::str::contains("#T-1"))
            .stdout(predicate::str::contains("Fix the fixture"));
    }

    #[test]
    fn test_next_remembers_source_in_prefs() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .args(["next", "--custom", &task_source_cmd()])
            .assert()
            .success();
        // A second run without flags reuses the remembered source.
        drydock()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("#T-1"));
    }

    #[test]
    fn test_next_with_failing_source_reports_unavailable() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .args(["next", "--custom", "exit 3"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unavailable"));
    }
}

// =============================================================================
// Full Lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_start_ships_with_stub_worker() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "true")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shipped"));

        // Claim released on success.
        drydock()
            .current_dir(dir.path())
            .arg("claims")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active claims"));

        // Checkpoint log survives in the worktree.
        let log = dir
            .path()
            .join(".drydock/worktrees/task-T-1/.drydock/checkpoint.json");
        assert!(log.exists());
        let content = fs::read_to_string(log).unwrap();
        assert!(content.contains("\"ship\""));
        assert!(content.contains("shipped"));
    }

    #[test]
    fn test_start_unknown_task_fails() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .args(["start", "T-404", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_failed_worker_halts_then_resume_ships() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "false")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("drydock resume T-1"));

        // Claim retained for resume.
        drydock()
            .current_dir(dir.path())
            .arg("claims")
            .assert()
            .success()
            .stdout(predicate::str::contains("#T-1"));

        // Resume with a working worker finishes the run.
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "true")
            .args(["resume", "T-1", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shipped"));
    }

    #[test]
    fn test_second_start_on_claimed_task_is_rejected() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "false")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure();

        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "true")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already claimed"));
    }

    #[test]
    fn test_abort_releases_claim_and_keeps_log() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "false")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure();

        drydock()
            .current_dir(dir.path())
            .args(["abort", "T-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Aborted"));

        drydock()
            .current_dir(dir.path())
            .arg("claims")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active claims"));

        let log = dir
            .path()
            .join(".drydock/worktrees/task-T-1/.drydock/checkpoint.json");
        assert!(log.exists());
        assert!(fs::read_to_string(log).unwrap().contains("aborted"));
    }

    #[test]
    fn test_status_shows_halted_instance() {
        let dir = create_repo();
        drydock()
            .current_dir(dir.path())
            .env("DRYDOCK_WORKER_CMD", "false")
            .args(["start", "T-1", "--custom", &task_source_cmd(), "--yes"])
            .assert()
            .failure();

        drydock()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("#T-1"))
            .stdout(predicate::str::contains("resumes:"));
    }
}
