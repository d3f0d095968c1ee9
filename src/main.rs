mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod render;
mod resource;
mod runner;
mod schema;
mod state;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Status(args) => commands::status::run(&ctx, args.target.as_deref()),
        Command::Diff(args) => commands::diff::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(
            &ctx,
            &commands::apply::ApplyArgs {
                target: args.target.as_deref(),
                dry_run: args.dry_run,
                yes: args.yes,
                jobs: args.jobs,
            },
        ),
        Command::Render(args) => commands::render::run(&ctx, args.site, args.program.as_deref()),
        Command::Doctor => commands::doctor::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "provis", &mut io::stdout());
            Ok(())
        }
    }
}
