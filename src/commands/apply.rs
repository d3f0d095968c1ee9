//! Apply command - converge the host to the desired state

use anyhow::Result;

use crate::engine::{ExecuteOptions, build_plan, execute};
use crate::state::{ApplyRecord, ResourceRecord};
use crate::{Context, config, ui};

pub struct ApplyArgs<'a> {
    pub target: Option<&'a str>,
    pub dry_run: bool,
    pub yes: bool,
    pub jobs: usize,
}

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Host Configuration");

    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let cfg = config::load(ctx.config.as_ref())?;
    let plan = build_plan(&cfg).filter_by_target(args.target);

    if plan.is_empty() {
        ui::warn("No resources match the target");
        return Ok(());
    }
    log::info!("Plan contains {} resources", plan.total_resources());

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };

    let (summary, outcomes) = execute(&plan, &opts)?;

    if !args.dry_run && !outcomes.is_empty() {
        let records = outcomes
            .iter()
            .map(|(id, result)| ResourceRecord {
                id: id.clone(),
                outcome: result.label(),
            })
            .collect();

        match config::state_dir().and_then(|dir| ApplyRecord::new(&summary, records).save(&dir)) {
            Ok(path) => log::debug!("Apply journal written to {}", path.display()),
            Err(e) => log::warn!("Could not write apply journal: {e}"),
        }
    }

    if !summary.is_success() {
        anyhow::bail!("{} resources failed to apply", summary.failed);
    }

    Ok(())
}
