//! Rendered configuration file resource
//!
//! Drift is detected by content hash; writes go through a temp file so a
//! partially written config is never left in place.

use anyhow::{Context, Result, bail};
use similar::TextDiff;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, SudoRequirement};

/// A file whose full content provis owns
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub content: String,
    pub privileged: bool,
}

/// Short blake3 prefix used in state details
fn short_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex()[..8].to_string()
}

impl ConfigFile {
    pub fn new(path: PathBuf, content: String) -> Self {
        Self {
            path,
            content,
            privileged: false,
        }
    }

    pub fn with_sudo(mut self, requires: bool) -> Self {
        self.privileged = requires;
        self
    }

    /// Read the current content; None when the file is missing
    fn read_current(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Could not read {}", self.path.display())),
        }
    }

    /// Write via sudo: stage in a temp file, then `install -D` into place
    fn write_privileged(&self, ctx: &ApplyContext) -> Result<()> {
        let sudo = ctx.require_sudo()?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config");
        let staged = std::env::temp_dir().join(format!(
            "provis-{}-{}",
            std::process::id(),
            file_name
        ));
        fs::write(&staged, &self.content)
            .with_context(|| format!("Could not stage {}", staged.display()))?;

        let staged_str = staged.to_string_lossy().to_string();
        let dest_str = self.path.to_string_lossy().to_string();
        let ok = sudo.run_status("install", &["-D", "-m", "0644", &staged_str, &dest_str])?;

        let _ = fs::remove_file(&staged);

        if !ok {
            bail!("Failed to install {}", self.path.display());
        }
        Ok(())
    }

    /// Direct write: temp file in the target directory, then rename
    fn write_direct(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config");
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

        fs::write(&tmp, &self.content)
            .with_context(|| format!("Could not write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Could not move into place: {}", self.path.display()))?;
        Ok(())
    }
}

impl Resource for ConfigFile {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Write {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "config_file"
    }

    fn sudo_requirement(&self) -> SudoRequirement {
        if self.privileged {
            SudoRequirement::Required {
                reason: format!("Writing {} requires root", self.path.display()),
            }
        } else {
            SudoRequirement::None
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        match self.read_current() {
            Ok(Some(existing)) => {
                if existing == self.content {
                    Ok(ResourceState::Present {
                        details: Some(short_hash(&existing)),
                    })
                } else {
                    Ok(ResourceState::Modified {
                        from: short_hash(&existing),
                        to: short_hash(&self.content),
                    })
                }
            }
            Ok(None) => Ok(ResourceState::Absent),
            // Unreadable (e.g. permission denied during status) is not fatal
            Err(_) => Ok(ResourceState::Unknown),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(short_hash(&self.content)),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        let existing = self.read_current().unwrap_or(None);
        if existing.as_deref() == Some(self.content.as_str()) {
            return Ok(ApplyResult::NoChange);
        }
        let was_present = existing.is_some();

        if self.privileged {
            self.write_privileged(ctx)?;
        } else {
            self.write_direct()?;
        }

        if was_present {
            Ok(ApplyResult::Modified)
        } else {
            Ok(ApplyResult::Created)
        }
    }

    fn content_diff(&self) -> Result<Option<String>> {
        let existing = match self.read_current() {
            Ok(Some(existing)) => existing,
            Ok(None) => String::new(),
            Err(_) => return Ok(None),
        };

        if existing == self.content {
            return Ok(None);
        }

        let diff = TextDiff::from_lines(&existing, &self.content);
        let text = diff
            .unified_diff()
            .context_radius(3)
            .header("current", "desired")
            .to_string();
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_in(dir: &std::path::Path, name: &str, content: &str) -> ConfigFile {
        ConfigFile::new(dir.join(name), content.to_string())
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let resource = file_in(dir.path(), "site.conf", "server {}\n");

        assert_eq!(resource.current_state().unwrap(), ResourceState::Absent);
        assert!(resource.needs_apply().unwrap());
    }

    #[test]
    fn test_apply_creates_then_converges() {
        let dir = tempfile::tempdir().unwrap();
        let resource = file_in(dir.path(), "site.conf", "server {}\n");

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
            sudo: None,
        };

        assert!(matches!(
            resource.apply(&mut ctx).unwrap(),
            ApplyResult::Created
        ));
        assert!(!resource.needs_apply().unwrap());
        assert!(matches!(
            resource.apply(&mut ctx).unwrap(),
            ApplyResult::NoChange
        ));
    }

    #[test]
    fn test_drift_detected_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.conf");
        fs::write(&path, "edited by hand\n").unwrap();

        let resource = ConfigFile::new(path, "server {}\n".to_string());

        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));

        let mut ctx = ApplyContext {
            dry_run: false,
            verbose: false,
            sudo: None,
        };
        assert!(matches!(
            resource.apply(&mut ctx).unwrap(),
            ApplyResult::Modified
        ));
        assert_eq!(fs::read_to_string(&resource.path).unwrap(), "server {}\n");
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let resource = file_in(dir.path(), "site.conf", "server {}\n");

        let mut ctx = ApplyContext {
            dry_run: true,
            verbose: false,
            sudo: None,
        };

        assert!(matches!(
            resource.apply(&mut ctx).unwrap(),
            ApplyResult::Skipped { .. }
        ));
        assert!(!resource.path.exists());
    }

    #[test]
    fn test_content_diff_shows_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.conf");
        fs::write(&path, "listen 8080;\n").unwrap();

        let resource = ConfigFile::new(path, "listen 80;\n".to_string());
        let diff = resource.content_diff().unwrap().unwrap();

        assert!(diff.contains("-listen 8080;"));
        assert!(diff.contains("+listen 80;"));
    }

    #[test]
    fn test_content_diff_none_when_equal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.conf");
        fs::write(&path, "server {}\n").unwrap();

        let resource = ConfigFile::new(path, "server {}\n".to_string());
        assert!(resource.content_diff().unwrap().is_none());
    }
}
