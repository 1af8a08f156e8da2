//! Read-only inspection — `drydock status`, `drydock claims`, `drydock config`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use super::super::Cli;
use drydock::checkpoint::CheckpointLog;
use drydock::config::Config;
use drydock::phase::{Outcome, Phase};
use drydock::registry::{ClaimRecord, Registry};

pub fn cmd_status(cli: &Cli, project_dir: PathBuf, target: Option<&str>) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    let registry = Registry::new(config.registry_path.clone());

    if let Some(target) = target {
        let claim = registry.resolve(Some(target))?;
        print_claim_detail(&claim);
        return Ok(());
    }

    let claims = registry.list()?;
    if claims.is_empty() {
        println!("{}", style("No active instances.").dim());
        return Ok(());
    }
    for claim in &claims {
        print_claim_detail(claim);
    }
    Ok(())
}

fn print_claim_detail(claim: &ClaimRecord) {
    println!(
        "{} {} on {}",
        style(format!("#{}", claim.id)).cyan().bold(),
        style(&claim.source).dim(),
        style(&claim.branch).green()
    );
    println!("  worktree:  {}", claim.worktree.display());
    println!("  claimed:   {}", claim.claimed_at.to_rfc3339());

    let log = CheckpointLog::new(Config::checkpoint_path(&claim.worktree));
    if !log.path().exists() {
        println!("  phase:     {}", style("not started").dim());
        return;
    }
    match log.load() {
        Ok(doc) => {
            if let Some(outcome) = doc.outcome() {
                let label = match outcome {
                    Outcome::Shipped => style("shipped").green(),
                    Outcome::Aborted => style("aborted").red(),
                };
                println!("  outcome:   {label}");
            }
            if let Some(phase) = &doc.workflow.current_phase {
                match Phase::parse_step(phase) {
                    Ok(p) => println!(
                        "  phase:     {phase} (attempt {})",
                        doc.attempt_count(p).max(1)
                    ),
                    Err(_) => println!("  phase:     {phase}"),
                }
            }
            if let Some(next) = &doc.resume.resume_from_step {
                println!("  resumes:   {next}");
            }
            if let Some(at) = doc.workflow.last_activity_at {
                println!("  activity:  {}", at.to_rfc3339());
            }
            println!("  steps:     {}", doc.steps.len());
        }
        Err(e) => println!("  {} {e}", style("log error:").red()),
    }
}

pub fn cmd_claims(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    let claims = Registry::new(config.registry_path.clone()).list()?;
    if claims.is_empty() {
        println!("{}", style("No active claims.").dim());
        return Ok(());
    }
    for claim in claims {
        println!(
            "{}  {}  {}  {}",
            style(format!("#{}", claim.id)).cyan(),
            claim.source,
            claim.branch,
            style(claim.claimed_at.to_rfc3339()).dim()
        );
    }
    Ok(())
}

pub fn cmd_config(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    println!("project dir:        {}", config.project_dir.display());
    println!("registry:           {}", config.registry_path.display());
    println!("preferences:        {}", config.prefs_path.display());
    println!("log dir:            {}", config.log_dir.display());
    println!("worker command:     {}", config.worker_cmd);
    println!("review budget:      {}", config.review_max_iterations);
    println!("validation budget:  {}", config.validation_max_attempts);
    Ok(())
}
