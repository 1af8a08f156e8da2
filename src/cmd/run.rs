//! Instance lifecycle — `drydock start`, `drydock resume`, `drydock abort`.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::PathBuf;

use super::super::{Cli, SourceArgs};
use super::discover::resolve_policy;
use drydock::checkpoint::CheckpointLog;
use drydock::config::Config;
use drydock::errors::EngineError;
use drydock::orchestrator::{
    ConsoleGate, ProcessWorker, StateMachine, WorkflowInstance, instance_from_claim,
};
use drydock::phase::Outcome;
use drydock::prefs::PreferenceCache;
use drydock::registry::{Registry, new_claim};
use drydock::source;
use drydock::worktree;

pub async fn cmd_start(cli: &Cli, project_dir: PathBuf, id: &str, args: &SourceArgs) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    config.ensure_directories()?;

    let prefs = PreferenceCache::new(config.prefs_path.clone());
    let policy = resolve_policy(args, &prefs)?;
    let adapter = source::adapter_for(&policy.task_source)?;

    let tasks = adapter.fetch().await?;
    let task = tasks
        .into_iter()
        .find(|t| t.id == id)
        .with_context(|| format!("Task {id} not found in the source"))?;

    let registry = Registry::new(config.registry_path.clone());
    let planned = worktree::planned_path(&config.project_dir, &task.id);
    let branch = worktree::branch_name(&task);

    // Claim before provisioning: losing the race must happen before any
    // side effects on disk.
    registry.claim(new_claim(&task.id, &task.source, planned, branch))?;

    let (worktree_path, branch) = match worktree::setup(&config.project_dir, &task) {
        Ok(v) => v,
        Err(e) => {
            registry.release(&task.id, &task.source)?;
            return Err(e.context("Failed to provision worktree"));
        }
    };
    prefs.remember_policy(&policy)?;

    let instance = WorkflowInstance {
        task,
        policy,
        worktree: worktree_path,
        branch,
    };
    println!(
        "Claimed {} on {}",
        style(format!("#{}", instance.task.id)).cyan(),
        style(&instance.branch).green()
    );
    drive(cli, &config, instance).await
}

pub async fn cmd_resume(cli: &Cli, project_dir: PathBuf, target: Option<&str>) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    let registry = Registry::new(config.registry_path.clone());

    let claim = registry.resolve(target)?;
    let log = CheckpointLog::new(Config::checkpoint_path(&claim.worktree));
    let instance = instance_from_claim(&claim, &log)?;

    println!(
        "Resuming {} ({})",
        style(format!("#{}", claim.id)).cyan(),
        style(&claim.branch).green()
    );
    drive(cli, &config, instance).await
}

pub fn cmd_abort(cli: &Cli, project_dir: PathBuf, target: Option<&str>) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    let registry = Registry::new(config.registry_path.clone());

    let claim = registry.resolve(target)?;
    let log = CheckpointLog::new(Config::checkpoint_path(&claim.worktree));
    // The log outlives the claim for post-mortem; a claim whose worktree
    // never materialized has no log to mark.
    if log.path().exists() {
        log.record_outcome(Outcome::Aborted)?;
    }
    registry.release(&claim.id, &claim.source)?;

    println!(
        "Aborted {}; checkpoint log kept at {}",
        style(format!("#{}", claim.id)).cyan(),
        log.path().display()
    );
    Ok(())
}

async fn drive(cli: &Cli, config: &Config, instance: WorkflowInstance) -> Result<()> {
    let registry = Registry::new(config.registry_path.clone());
    let log = CheckpointLog::new(Config::checkpoint_path(&instance.worktree));
    let worker = ProcessWorker::new(config.worker_cmd.clone(), config.log_dir.clone());
    let gate = ConsoleGate::new(cli.yes);

    let mut machine = StateMachine::new(
        config.clone(),
        registry,
        log,
        Box::new(worker),
        Box::new(gate),
    );

    match machine.run(&instance).await {
        Ok(Outcome::Shipped) => {
            println!(
                "{} {} shipped",
                style("✓").green(),
                style(format!("#{}", instance.task.id)).cyan()
            );
            Ok(())
        }
        Ok(Outcome::Aborted) => {
            println!("{} instance aborted", style("✗").red());
            Ok(())
        }
        Err(err) => {
            report_halt(&err, &instance);
            bail!("run halted: {err}");
        }
    }
}

/// State the failure kind, the phase, and the exact arguments to retry.
fn report_halt(err: &EngineError, instance: &WorkflowInstance) {
    let phase = match err {
        EngineError::WorkerFailed { phase, .. }
        | EngineError::IterationLimitExceeded { phase, .. } => Some(*phase),
        EngineError::PlanRejected => Some(drydock::phase::Phase::AwaitApproval),
        _ => None,
    };
    eprintln!();
    match phase {
        Some(phase) => eprintln!(
            "{} {} during {}",
            style("Halted:").red().bold(),
            err,
            style(phase).yellow()
        ),
        None => eprintln!("{} {}", style("Halted:").red().bold(), err),
    }
    eprintln!(
        "The claim is retained. Resume with: {}",
        style(format!("drydock resume {}", instance.task.id)).green()
    );
    eprintln!(
        "Inspect the log at: {}",
        Config::checkpoint_path(&instance.worktree).display()
    );
}
