//! apt package resource

use anyhow::{Context, Result, bail};
use std::sync::OnceLock;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};
use crate::runner;
use crate::sudo::SudoContext;

/// An apt package
#[derive(Debug, Clone)]
pub struct AptPackage {
    pub name: String,
}

// The package index is refreshed once per run, before the first install
static INDEX_REFRESHED: OnceLock<()> = OnceLock::new();

impl AptPackage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Check if the package is installed
    fn is_installed(&self) -> Result<bool> {
        let output = runner::run_output("dpkg-query", &["-W", "-f=${Status}", &self.name])
            .context("Failed to run dpkg-query")?;

        if !output.status.success() {
            return Ok(false);
        }

        let status = String::from_utf8_lossy(&output.stdout);
        Ok(status.contains("install ok installed"))
    }

    fn refresh_index(sudo: &SudoContext) {
        INDEX_REFRESHED.get_or_init(|| {
            if let Err(e) = sudo.run_capture("apt-get", &["update", "-q"]) {
                log::warn!("apt-get update failed: {e}");
            }
        });
    }

    /// Install the package
    fn install(&self, ctx: &ApplyContext) -> Result<()> {
        let sudo = ctx.require_sudo()?;
        Self::refresh_index(sudo);

        let ok = sudo.run_status(
            "apt-get",
            &["install", "-y", "-q", "--no-install-recommends", &self.name],
        )?;

        if !ok {
            bail!("apt-get install {} failed", self.name);
        }

        Ok(())
    }
}

impl Resource for AptPackage {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Install {} via apt", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "apt_package"
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::Required {
            reason: format!("Installing {} requires root", self.name),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_installed()? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        if self.is_installed()? {
            return Ok(ApplyResult::NoChange);
        }

        self.install(ctx)?;
        Ok(ApplyResult::Created)
    }
}
