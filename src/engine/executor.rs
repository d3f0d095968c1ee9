//! Execution engine - applies the plan with privilege batching

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::progress;
use crate::resource::{ApplyContext, ApplyResult, Resource};
use crate::sudo::SudoContext;

use super::differ::{compute_diffs, display_diff, display_sudo_boundary};
use super::planner::{ExecutionPlan, PostAction};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs for unprivileged resources
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn add(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Per-resource outcome of an execution
pub type ResourceOutcome = (String, ApplyResult);

/// Execute the plan: diff, confirm, converge, post actions
pub fn execute(
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<(ExecuteSummary, Vec<ResourceOutcome>)> {
    // 1. Compute diffs for all resources
    let unprivileged_diffs = compute_diffs(&plan.unprivileged);
    let privileged_diffs = compute_diffs(&plan.privileged);
    let all_diffs: Vec<_> = unprivileged_diffs
        .iter()
        .chain(privileged_diffs.iter())
        .cloned()
        .collect();

    // 2. Display what will change
    display_diff(&all_diffs, opts.verbose);

    let mut summary = ExecuteSummary::default();
    let mut outcomes: Vec<ResourceOutcome> = Vec::new();

    if all_diffs.is_empty() {
        return Ok((summary, outcomes));
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok((summary, outcomes));
    }

    // 3. Confirm (unless --yes)
    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        summary.skipped = all_diffs.len();
        return Ok((summary, outcomes));
    }

    // 4. Apply unprivileged in parallel
    if !plan.unprivileged.is_empty() {
        println!();
        println!(
            "  {} Applying {} unprivileged resources...",
            "→".cyan(),
            plan.unprivileged.len()
        );

        let results = execute_batch(&plan.unprivileged, opts.jobs, opts.verbose, None)?;
        record(&mut summary, &mut outcomes, results);
    }

    // 5. If any privileged operations, acquire sudo ONCE
    let mut sudo_ctx: Option<SudoContext> = None;
    if !plan.privileged.is_empty() {
        display_sudo_boundary(&privileged_diffs);

        if !opts.yes && !confirm_proceed()? {
            summary.skipped += plan.privileged.len();
            print_summary(&summary);
            return Ok((summary, outcomes));
        }

        let sudo = SudoContext::acquire("Apply privileged host configuration")?;

        println!();
        println!(
            "  {} Applying {} privileged resources...",
            "→".cyan(),
            plan.privileged.len()
        );

        // Sequential: shared sudo, and supervisorctl races on its socket
        let results = execute_batch(&plan.privileged, 1, opts.verbose, Some(&sudo))?;
        record(&mut summary, &mut outcomes, results);

        sudo_ctx = Some(sudo);
    }

    // 6. Post actions, only when something actually changed
    if !plan.post_actions.is_empty() && summary.total_changes() > 0 {
        println!();
        println!("  {} Running post actions...", "→".cyan());

        if sudo_ctx.is_none() {
            sudo_ctx = Some(SudoContext::acquire("Restart services")?);
        }
        if let Some(sudo) = &sudo_ctx {
            for action in &plan.post_actions {
                run_post_action(action, sudo, &mut summary)?;
            }
        }
    }
    drop(sudo_ctx);

    // 7. Summary
    print_summary(&summary);

    Ok((summary, outcomes))
}

/// Apply a batch of resources with a bounded thread pool
fn execute_batch(
    resources: &[Box<dyn Resource>],
    jobs: usize,
    verbose: bool,
    sudo: Option<&SudoContext>,
) -> Result<Vec<ResourceOutcome>> {
    let pb = progress::apply_bar(resources.len() as u64, "Applying");
    let results: Arc<Mutex<Vec<ResourceOutcome>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        resources.par_iter().for_each(|resource| {
            let mut ctx = ApplyContext {
                dry_run: false,
                verbose,
                sudo,
            };

            let result = match resource.apply(&mut ctx) {
                Ok(r) => r,
                Err(e) => ApplyResult::Failed {
                    error: e.to_string(),
                },
            };

            let symbol = match &result {
                ApplyResult::NoChange => "○",
                ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
                ApplyResult::Failed { .. } => "✗",
                ApplyResult::Skipped { .. } => "⊘",
            };

            pb.set_message(format!("{} {}", symbol, resource.id()));
            pb.inc(1);

            push_outcome(&results, (resource.id(), result));
        });
    });

    pb.finish_and_clear();

    into_outcomes(results)
}

fn push_outcome(results: &Arc<Mutex<Vec<ResourceOutcome>>>, outcome: ResourceOutcome) {
    match results.lock() {
        Ok(mut locked) => locked.push(outcome),
        Err(poisoned) => poisoned.into_inner().push(outcome),
    }
}

fn into_outcomes(results: Arc<Mutex<Vec<ResourceOutcome>>>) -> Result<Vec<ResourceOutcome>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

fn record(
    summary: &mut ExecuteSummary,
    outcomes: &mut Vec<ResourceOutcome>,
    results: Vec<ResourceOutcome>,
) {
    for (id, result) in results {
        summary.add(&result);
        if let ApplyResult::Failed { error } = &result {
            println!("    {} {} - {}", "✗".red(), id, error.dimmed());
        }
        outcomes.push((id, result));
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Run one post action under the sudo context
fn run_post_action(
    action: &PostAction,
    sudo: &SudoContext,
    summary: &mut ExecuteSummary,
) -> Result<()> {
    match action {
        PostAction::ValidateProxy => {
            // A broken proxy config must never reach a restart
            let pb = progress::spinner("Validating proxy configuration...");
            if let Err(e) = sudo.run_capture("nginx", &["-t"]) {
                progress::finish_error(&pb, "Proxy configuration invalid");
                bail!("Proxy configuration is invalid: {e}");
            }
            progress::finish_success(&pb, "Proxy configuration valid");
        }
        PostAction::RestartService(service) => {
            if sudo.run_status("systemctl", &["restart", service])? {
                println!("    {} Restarted {}", "✓".green(), service);
            } else {
                println!("    {} Could not restart {}", "✗".red(), service);
                summary.failed += 1;
            }
        }
        PostAction::SupervisorReload => {
            sudo.run_capture("supervisorctl", &["reread"])?;
            sudo.run_capture("supervisorctl", &["update"])?;
            println!("    {} Supervisor configuration reloaded", "✓".green());
        }
        PostAction::RestartProgram(name) => {
            if sudo.run_status("supervisorctl", &["restart", name])? {
                println!("    {} Restarted program {}", "✓".green(), name);
            } else {
                println!("    {} Could not restart program {}", "✗".red(), name);
                summary.failed += 1;
            }
        }
    }
    Ok(())
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Host configuration applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Host configuration applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add(&ApplyResult::Created);
        summary.add(&ApplyResult::Modified);
        summary.add(&ApplyResult::NoChange);
        summary.add(&ApplyResult::Failed {
            error: "boom".to_string(),
        });

        assert_eq!(summary.total_changes(), 2);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_push_outcome_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ResourceOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_outcome(&results, ("nginx".to_string(), ApplyResult::NoChange));

        let len = match results.lock() {
            Ok(locked) => locked.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        assert_eq!(len, 1);
    }

    #[test]
    fn test_into_outcomes_recovers_from_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ResourceOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let mut guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            guard.push(("nginx".to_string(), ApplyResult::NoChange));
            panic!("intentional poison");
        })
        .join();

        let collected = into_outcomes(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }
}
