//! Render command - print generated configuration text

use anyhow::Result;
use colored::Colorize;

use crate::{Context, config, render};

pub fn run(ctx: &Context, site: bool, program: Option<&str>) -> Result<()> {
    let cfg = config::load(ctx.config.as_ref())?;

    // With no selection, print everything
    let all = !site && program.is_none();

    if site || all {
        if !ctx.quiet {
            eprintln!("{}", format!("# {}", cfg.site.available_path().display()).dimmed());
        }
        print!("{}", render::nginx::server_block(&cfg.site));
    }

    if let Some(name) = program {
        let Some(found) = cfg.find_program(name) else {
            anyhow::bail!("No program named '{name}' in configuration");
        };
        if !ctx.quiet {
            eprintln!("{}", format!("# {}", found.conf_path().display()).dimmed());
        }
        print!("{}", render::supervisor::program_block(found));
    } else if all {
        for found in &cfg.programs {
            println!();
            if !ctx.quiet {
                eprintln!("{}", format!("# {}", found.conf_path().display()).dimmed());
            }
            print!("{}", render::supervisor::program_block(found));
        }
    }

    Ok(())
}
