//! Symlink resource - enables or removes site links

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};

/// A symlink to create, or to remove when `target` is None
#[derive(Debug, Clone)]
pub struct Symlink {
    pub path: PathBuf,
    pub target: Option<PathBuf>,
    pub privileged: bool,
}

impl Symlink {
    /// Link `path` to `target`
    pub fn new(path: PathBuf, target: PathBuf) -> Self {
        Self {
            path,
            target: Some(target),
            privileged: false,
        }
    }

    /// Ensure `path` does not exist
    pub fn absent(path: PathBuf) -> Self {
        Self {
            path,
            target: None,
            privileged: false,
        }
    }

    pub fn with_sudo(mut self, requires: bool) -> Self {
        self.privileged = requires;
        self
    }

    fn create(&self, ctx: &ApplyContext, target: &Path) -> Result<()> {
        if self.privileged {
            let sudo = ctx.require_sudo()?;
            let target_str = target.to_string_lossy().to_string();
            let path_str = self.path.to_string_lossy().to_string();
            if !sudo.run_status("ln", &["-sfn", &target_str, &path_str])? {
                bail!("Failed to link {}", self.path.display());
            }
            return Ok(());
        }

        if fs::symlink_metadata(&self.path).is_ok() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Could not replace {}", self.path.display()))?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &self.path)
            .with_context(|| format!("Could not link {}", self.path.display()))?;
        Ok(())
    }

    fn remove(&self, ctx: &ApplyContext) -> Result<()> {
        if self.privileged {
            let sudo = ctx.require_sudo()?;
            let path_str = self.path.to_string_lossy().to_string();
            if !sudo.run_status("rm", &["-f", &path_str])? {
                bail!("Failed to remove {}", self.path.display());
            }
            return Ok(());
        }

        fs::remove_file(&self.path)
            .with_context(|| format!("Could not remove {}", self.path.display()))?;
        Ok(())
    }
}

impl Resource for Symlink {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        match &self.target {
            Some(target) => format!("Link {} -> {}", self.path.display(), target.display()),
            None => format!("Remove {}", self.path.display()),
        }
    }

    fn resource_type(&self) -> &'static str {
        "symlink"
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        if self.privileged {
            SudoRequirement::Required {
                reason: format!("Changing {} requires root", self.path.display()),
            }
        } else {
            SudoRequirement::None
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Ok(metadata) = fs::symlink_metadata(&self.path) else {
            return Ok(ResourceState::Absent);
        };

        if metadata.file_type().is_symlink() {
            let pointee = fs::read_link(&self.path)
                .with_context(|| format!("Could not read link {}", self.path.display()))?;
            Ok(ResourceState::Present {
                details: Some(pointee.to_string_lossy().to_string()),
            })
        } else {
            Ok(ResourceState::Present {
                details: Some("not a symlink".to_string()),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        match &self.target {
            Some(target) => ResourceState::Present {
                details: Some(target.to_string_lossy().to_string()),
            },
            None => ResourceState::Absent,
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        let current = self.current_state()?;
        let desired = self.desired_state();
        if current == desired {
            return Ok(ApplyResult::NoChange);
        }

        match &self.target {
            Some(target) => {
                let was_present = !matches!(current, ResourceState::Absent);
                self.create(ctx, target)?;
                if was_present {
                    Ok(ApplyResult::Modified)
                } else {
                    Ok(ApplyResult::Created)
                }
            }
            None => {
                self.remove(ctx)?;
                Ok(ApplyResult::Removed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_converge() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("site.conf");
        fs::write(&target, "server {}\n").unwrap();

        let link = Symlink::new(dir.path().join("enabled.conf"), target);
        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
            sudo: None,
        };

        assert!(matches!(link.apply(&mut ctx).unwrap(), ApplyResult::Created));
        assert!(!link.needs_apply().unwrap());
        assert!(matches!(
            link.apply(&mut ctx).unwrap(),
            ApplyResult::NoChange
        ));
    }

    #[test]
    fn test_retarget_is_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enabled.conf");
        std::os::unix::fs::symlink(dir.path().join("old.conf"), &path).unwrap();

        let link = Symlink::new(path, dir.path().join("new.conf"));
        assert!(link.needs_apply().unwrap());

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
            sudo: None,
        };
        assert!(matches!(
            link.apply(&mut ctx).unwrap(),
            ApplyResult::Modified
        ));
        assert_eq!(
            fs::read_link(&link.path).unwrap(),
            dir.path().join("new.conf")
        );
    }

    #[test]
    fn test_absent_removes_existing_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default");
        std::os::unix::fs::symlink(dir.path().join("default.conf"), &path).unwrap();

        let link = Symlink::absent(path);
        assert!(link.needs_apply().unwrap());

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
            sudo: None,
        };
        assert!(matches!(link.apply(&mut ctx).unwrap(), ApplyResult::Removed));
        assert!(!link.needs_apply().unwrap());
    }

    #[test]
    fn test_absent_missing_is_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let link = Symlink::absent(dir.path().join("default"));

        assert!(!link.needs_apply().unwrap());
    }
}
