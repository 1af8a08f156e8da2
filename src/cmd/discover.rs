//! Candidate discovery — `drydock next`.

use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

use super::super::{Cli, SourceArgs};
use drydock::config::Config;
use drydock::discovery;
use drydock::prefs::PreferenceCache;
use drydock::registry::Registry;
use drydock::source;
use drydock::task::{Policy, TaskSourceSpec};

/// Build the policy from flags, falling back to the preference cache, and
/// finally to an interactive prompt. The result is remembered for the
/// next invocation.
pub fn resolve_policy(args: &SourceArgs, prefs: &PreferenceCache) -> Result<Policy> {
    let remembered = prefs.last_policy().unwrap_or_default();

    let task_source = if let Some(ref slug) = args.source {
        TaskSourceSpec::Fixed {
            reference: slug.clone(),
        }
    } else if let Some(ref command) = args.custom {
        TaskSourceSpec::CustomTool {
            description: command.clone(),
            command: command.clone(),
        }
    } else if let Some(ref last) = remembered {
        last.task_source.clone()
    } else {
        prompt_for_source()?
    };

    Ok(Policy {
        task_source,
        priority_filter: args
            .filter
            .or(remembered.as_ref().map(|p| p.priority_filter))
            .unwrap_or_default(),
        stopping_point: args
            .stop
            .or(remembered.as_ref().map(|p| p.stopping_point))
            .unwrap_or_default(),
    })
}

fn prompt_for_source() -> Result<TaskSourceSpec> {
    let kinds = &["GitHub repository", "Custom command"];
    let kind = dialoguer::Select::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Where should tasks come from?")
        .items(kinds)
        .default(0)
        .interact()
        .context("No task source given and no remembered policy")?;

    if kind == 0 {
        let slug: String = dialoguer::Input::new()
            .with_prompt("GitHub repository (owner/repo)")
            .interact_text()?;
        Ok(TaskSourceSpec::Fixed { reference: slug })
    } else {
        let command: String = dialoguer::Input::new()
            .with_prompt("Command emitting one JSON task per line")
            .interact_text()?;
        Ok(TaskSourceSpec::CustomTool {
            description: command.clone(),
            command,
        })
    }
}

pub async fn cmd_next(cli: &Cli, project_dir: PathBuf, args: &SourceArgs) -> Result<()> {
    let config = Config::new(project_dir, cli.verbose)?;
    config.ensure_directories()?;

    let prefs = PreferenceCache::new(config.prefs_path.clone());
    let policy = resolve_policy(args, &prefs)?;
    let adapter = source::adapter_for(&policy.task_source)?;
    let registry = Registry::new(config.registry_path.clone());

    let ranked = discovery::discover(adapter.as_ref(), &registry, &policy).await?;
    prefs.remember_policy(&policy)?;

    if ranked.is_empty() {
        println!("{}", style("No candidates after filtering.").dim());
        return Ok(());
    }

    println!("{}", style("Top candidates").bold().underlined());
    for (rank, task) in ranked.iter().enumerate() {
        println!(
            "  {}. {} {} {}",
            rank + 1,
            style(format!("#{}", task.id)).cyan(),
            style(format!("[{:>3}]", task.score)).yellow(),
            task.title,
        );
        if !task.labels.is_empty() {
            println!("       {}", style(task.labels.join(", ")).dim());
        }
    }
    println!(
        "\nRun {} to claim one.",
        style("drydock start <id>").green()
    );
    Ok(())
}
