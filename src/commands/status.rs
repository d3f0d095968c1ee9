//! Status command - current state vs desired state

use anyhow::Result;
use colored::Colorize;

use crate::engine::build_plan;
use crate::resource::{Resource, ResourceState};
use crate::state::ApplyRecord;
use crate::{Context, config, ui};

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    ui::header("Provis Status");

    let cfg = config::load(ctx.config.as_ref())?;
    let plan = build_plan(&cfg).filter_by_target(target);

    if plan.is_empty() {
        ui::warn("No resources match the target");
        return Ok(());
    }

    let mut current_type = String::new();
    let mut pending = 0usize;

    for resource in plan.resources() {
        if resource.resource_type() != current_type {
            current_type = resource.resource_type().to_string();
            ui::section(type_heading(&current_type));
        }

        let current = resource
            .current_state()
            .unwrap_or(ResourceState::Unknown);
        let desired = resource.desired_state();
        let converged = current == desired;
        if !converged {
            pending += 1;
        }

        let icon = match (&current, converged) {
            (_, true) => "✓".green(),
            (ResourceState::Unknown, _) => "?".dimmed(),
            (ResourceState::Absent, _) => "✗".red(),
            _ => "⚠".yellow(),
        };

        println!(
            "  {} {} {}",
            icon,
            ui::truncate_path(&resource.id(), ui::ID_WIDTH).bold(),
            describe_state(&current).dimmed()
        );

        if ctx.verbose > 0 && !ctx.quiet {
            ui::dim(&format!("    {}", resource.description()));
        }
    }

    println!();
    if pending == 0 {
        ui::success("Host matches desired state");
    } else {
        ui::warn(&format!("{pending} resources pending, run `provis apply`"));
    }

    if let Ok(dir) = config::state_dir()
        && let Ok(Some(record)) = ApplyRecord::load(&dir)
    {
        ui::dim(&format!(
            "Last apply: {} ({} changes)",
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            record.created + record.modified + record.removed
        ));
    }

    Ok(())
}

fn type_heading(resource_type: &str) -> &str {
    match resource_type {
        "apt_package" => "Packages",
        "config_file" => "Config files",
        "symlink" => "Symlinks",
        "supervisor_program" => "Supervised programs",
        other => other,
    }
}

fn describe_state(state: &ResourceState) -> String {
    match state {
        ResourceState::Present { details: Some(d) } => format!("({d})"),
        ResourceState::Present { details: None } => "(present)".to_string(),
        ResourceState::Absent => "(missing)".to_string(),
        ResourceState::Modified { from, to } => format!("({from} → {to})"),
        ResourceState::Unknown => "(unknown)".to_string(),
    }
}
