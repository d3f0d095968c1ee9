//! Diff computation and display

use colored::Colorize;

use crate::resource::{Resource, ResourceDiff, ResourceState};

/// Compute diffs for all resources
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| ResourceDiff::from_resource(r.as_ref()).ok().flatten())
        .collect()
}

fn type_heading(resource_type: &str) -> &str {
    match resource_type {
        "apt_package" => "Packages (apt)",
        "config_file" => "Config files",
        "symlink" => "Symlinks",
        "supervisor_program" => "Supervised programs",
        other => other,
    }
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff], show_content: bool) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    // Group by resource type, preserving plan order
    let mut order: Vec<&str> = Vec::new();
    for diff in diffs {
        if !order.contains(&diff.resource_type.as_str()) {
            order.push(&diff.resource_type);
        }
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", "Configuration Diff".bold());
    println!("│");

    for resource_type in &order {
        println!("│ {}", type_heading(resource_type).bold());

        for diff in diffs.iter().filter(|d| &d.resource_type == resource_type) {
            let symbol = match (&diff.current, &diff.desired) {
                (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
                (_, ResourceState::Absent) => "-".red(),
                (ResourceState::Modified { .. }, _) | (_, ResourceState::Modified { .. }) => {
                    "~".yellow()
                }
                _ => "~".yellow(),
            };

            let sudo_indicator = if diff.requires_sudo {
                " [sudo]".red().to_string()
            } else {
                String::new()
            };

            let state_desc = match (&diff.current, &diff.desired) {
                (ResourceState::Absent, ResourceState::Present { details }) => format!(
                    "(missing){}",
                    details
                        .as_ref()
                        .map(|d| format!(" → {}", d))
                        .unwrap_or_default()
                ),
                (ResourceState::Modified { from, to }, _) => format!("{} → {}", from, to),
                (ResourceState::Present { .. }, ResourceState::Absent) => {
                    "(will remove)".to_string()
                }
                (ResourceState::Present { details: from }, ResourceState::Present { details: to }) => {
                    format!(
                        "{} → {}",
                        from.as_deref().unwrap_or("current"),
                        to.as_deref().unwrap_or("desired")
                    )
                }
                (ResourceState::Unknown, _) => "(state unknown)".to_string(),
                _ => String::new(),
            };

            println!(
                "│   {} {:<42} {}{}",
                symbol,
                diff.resource_id,
                state_desc.dimmed(),
                sudo_indicator
            );

            if show_content
                && let Some(content) = &diff.content_diff
            {
                for line in content.lines() {
                    let line = match line.chars().next() {
                        Some('+') => line.green().to_string(),
                        Some('-') => line.red().to_string(),
                        _ => line.dimmed().to_string(),
                    };
                    println!("│       {}", line);
                }
            }
        }
        println!("│");
    }

    // Summary
    let sudo_count = diffs.iter().filter(|d| d.requires_sudo).count();
    let regular_count = diffs.len() - sudo_count;

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} unprivileged, {} require sudo)",
        diffs.len().to_string().bold(),
        regular_count.to_string().green(),
        sudo_count.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display the sudo boundary warning
pub fn display_sudo_boundary(privileged_diffs: &[ResourceDiff]) {
    if privileged_diffs.is_empty() {
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Privilege Boundary".yellow().bold()
    );
    println!("│");
    println!(
        "│  {}  The following {} operations require sudo:",
        "⚠".yellow(),
        privileged_diffs.len()
    );
    println!("│");

    for diff in privileged_diffs.iter().take(10) {
        println!("│  • {}", diff.description);
    }

    if privileged_diffs.len() > 10 {
        println!("│  • ... and {} more", privileged_diffs.len() - 10);
    }

    println!("│");
    println!("│  Sudo will be requested once and released immediately after.");
    println!("│");
    println!("└─────────────────────────────────────────────────────────────┘");
}
