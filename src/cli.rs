use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provis")]
#[command(version)]
#[command(about = "Declarative host provisioner - packages, config files, services", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "PROVIS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show current state vs desired state
    Status(TargetArgs),

    /// Preview what apply would change
    Diff(TargetArgs),

    /// Converge the host to the desired state
    Apply(ApplyArgs),

    /// Print generated configuration text
    Render(RenderArgs),

    /// Check the host for required tooling
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct TargetArgs {
    /// Limit to matching resources, e.g. "packages" or "files.nginx"
    pub target: Option<String>,
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Limit to matching resources, e.g. "packages" or "files.nginx"
    pub target: Option<String>,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Parallel jobs for unprivileged resources
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,
}

#[derive(clap::Args)]
pub struct RenderArgs {
    /// Render the reverse-proxy site file
    #[arg(long)]
    pub site: bool,

    /// Render the named program file
    #[arg(long)]
    pub program: Option<String>,
}
