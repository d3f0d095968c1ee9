//! Doctor command - check the host for required tooling

use anyhow::Result;
use colored::Colorize;

use crate::{Context, config, runner, ui};

const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("apt-get", "package installation"),
    ("nginx", "reverse proxy"),
    ("supervisorctl", "process supervision"),
    ("systemctl", "service restarts"),
];

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Provis Doctor");

    ui::section("Host tools");
    let mut missing = 0usize;
    for (tool, purpose) in REQUIRED_TOOLS {
        if runner::command_exists(tool) {
            println!("  {} {} {}", "✓".green(), tool.bold(), format!("({purpose})").dimmed());
        } else {
            println!("  {} {} {}", "✗".red(), tool.bold(), format!("({purpose})").dimmed());
            missing += 1;
        }
    }

    ui::section("Privileges");
    if runner::is_root() {
        ui::success("Running as root");
    } else if runner::command_exists("sudo") {
        if runner::run_quiet("sudo", &["-n", "true"]) {
            ui::success("sudo credentials cached");
        } else {
            ui::info("Not root; sudo will prompt for privileged resources");
        }
    } else {
        ui::warn("Not root and sudo not found; apply will fail on system paths");
    }

    ui::section("Configuration");
    match config::resolve_path(ctx.config.as_ref()) {
        Some(path) => {
            ui::kv("Config file", &path.display().to_string());
            match config::load(ctx.config.as_ref()) {
                Ok(cfg) => {
                    ui::success(&format!(
                        "Valid: site '{}', {} programs, {} packages",
                        cfg.site.name,
                        cfg.programs.len(),
                        cfg.packages.apt.len()
                    ));
                }
                Err(e) => {
                    ui::error(&format!("Invalid: {e:#}"));
                    missing += 1;
                }
            }
        }
        None => {
            ui::info("No config file found; defaults describe the stock deployment");
        }
    }

    if let Ok(dir) = config::state_dir() {
        ui::kv("State dir", &dir.display().to_string());
    }

    println!();
    if missing == 0 {
        ui::success("Host is ready for provisioning");
    } else {
        ui::warn(&format!(
            "{missing} problems found; packages may be installed by `provis apply` itself"
        ));
    }

    Ok(())
}
