use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use drydock::task::{PriorityFilter, StoppingPoint};

mod cmd;

#[derive(Parser)]
#[command(name = "drydock")]
#[command(version, about = "Workflow orchestration engine for claimed tasks")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Auto-approve the plan gate.
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Args)]
pub struct SourceArgs {
    /// Fixed source: a GitHub `owner/repo` slug.
    #[arg(long)]
    pub source: Option<String>,

    /// Custom tool source: a command emitting one JSON task per line.
    #[arg(long, conflicts_with = "source")]
    pub custom: Option<String>,

    #[arg(long, value_enum)]
    pub filter: Option<PriorityFilter>,

    /// How far to take the work before stopping.
    #[arg(long, value_enum)]
    pub stop: Option<StoppingPoint>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover and rank the next candidates to work on
    Next {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Claim a task and drive it through the phase sequence
    Start {
        /// Task id within the source
        id: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Resume an interrupted instance by id, branch, or worktree path
    Resume { target: Option<String> },
    /// Show instance status (read-only)
    Status { target: Option<String> },
    /// Abort an instance: release its claim, keep its log
    Abort { target: Option<String> },
    /// List active claims
    Claims,
    /// Show effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.verbose { "drydock=debug" } else { "drydock=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    match &cli.command {
        Commands::Next { source } => cmd::cmd_next(&cli, project_dir, source).await,
        Commands::Start { id, source } => cmd::cmd_start(&cli, project_dir, id, source).await,
        Commands::Resume { target } => {
            cmd::cmd_resume(&cli, project_dir, target.as_deref()).await
        }
        Commands::Status { target } => cmd::cmd_status(&cli, project_dir, target.as_deref()),
        Commands::Abort { target } => cmd::cmd_abort(&cli, project_dir, target.as_deref()),
        Commands::Claims => cmd::cmd_claims(&cli, project_dir),
        Commands::Config => cmd::cmd_config(&cli, project_dir),
    }
}
