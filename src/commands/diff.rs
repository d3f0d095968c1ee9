//! Diff command - preview what apply would change

use anyhow::Result;
use colored::Colorize;

use crate::engine::{build_plan, differ};
use crate::{Context, config, ui};

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    ui::header("Configuration Diff");

    let cfg = config::load(ctx.config.as_ref())?;
    let plan = build_plan(&cfg).filter_by_target(target);

    if plan.is_empty() {
        ui::warn("No resources match the target");
        return Ok(());
    }

    let mut diffs = differ::compute_diffs(&plan.unprivileged);
    diffs.extend(differ::compute_diffs(&plan.privileged));

    // Content diffs are the point of this command; always show them
    differ::display_diff(&diffs, true);

    if !diffs.is_empty() {
        ui::section("After converging");
        for action in &plan.post_actions {
            println!("  {} {}", "→".cyan(), action.describe());
        }

        if !ctx.quiet {
            println!();
            ui::dim("Run `provis apply` to converge");
        }
    }

    Ok(())
}
