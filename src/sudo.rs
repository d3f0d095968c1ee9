//! Scoped sudo context with deterministic classification
//!
//! Sudo is never requested for the entire process. Instead:
//! 1. Resource types map deterministically to a privilege level
//! 2. All changes are computed first (no sudo needed)
//! 3. Sudo is acquired once for the privileged batch
//! 4. Sudo is released immediately after
//!
//! When the process already runs as root (the usual case on a fresh host),
//! acquisition and release are no-ops and commands run directly.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::process::{Command, Output};

use crate::runner;

/// Path prefixes that only root may write to
const SYSTEM_PREFIXES: &[&str] = &["/etc/", "/usr/", "/var/", "/opt/"];

/// Configuration for the privilege classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SudoConfig {
    /// Resource ids that may be applied without sudo even when their type
    /// normally requires it (e.g. config files rooted in a user directory)
    #[serde(default)]
    pub unprivileged: Vec<String>,
}

impl SudoConfig {
    /// Check if a resource requires sudo
    pub fn requires_sudo(&self, resource_type: &str, resource_id: &str) -> bool {
        if self.unprivileged.iter().any(|id| id == resource_id) {
            return false;
        }

        match resource_type {
            "apt_package" | "supervisor_program" => true,
            "config_file" | "symlink" => SYSTEM_PREFIXES
                .iter()
                .any(|prefix| resource_id.starts_with(prefix)),
            _ => false,
        }
    }
}

/// Scoped sudo context - automatically invalidates on drop
pub struct SudoContext {
    /// Running as root already; commands run without the sudo prefix
    direct: bool,
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to the user
    pub fn acquire(reason: &str) -> Result<Self> {
        if runner::is_root() {
            return Ok(Self { direct: true });
        }

        eprintln!();
        eprintln!("  Sudo required: {}", reason);
        eprintln!();

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo")
            .args(["-v"])
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { direct: false })
    }

    fn run_internal(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let output = if self.direct {
            Command::new(cmd)
                .args(args)
                .output()
                .with_context(|| format!("Failed to execute: {} {:?}", cmd, args))?
        } else {
            Command::new("sudo")
                .arg(cmd)
                .args(args)
                .output()
                .with_context(|| format!("Failed to execute: sudo {} {:?}", cmd, args))?
        };

        Ok(output)
    }

    /// Run a privileged command and capture stdout
    pub fn run_capture(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.run_internal(cmd, args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Command failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a privileged command, returning success/failure
    pub fn run_status(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        let output = self.run_internal(cmd, args)?;
        Ok(output.status.success())
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        // Invalidate the sudo timestamp to release privileges
        if !self.direct {
            let _ = Command::new("sudo").args(["-k"]).status();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_config_defaults() {
        let config = SudoConfig::default();
        assert!(config.unprivileged.is_empty());
    }

    #[test]
    fn test_packages_require_sudo() {
        let config = SudoConfig::default();
        assert!(config.requires_sudo("apt_package", "nginx"));
        assert!(config.requires_sudo("supervisor_program", "newjilo"));
    }

    #[test]
    fn test_system_paths_require_sudo() {
        let config = SudoConfig::default();
        assert!(config.requires_sudo("config_file", "/etc/nginx/sites-available/newjilo.conf"));
        assert!(config.requires_sudo("symlink", "/etc/nginx/sites-enabled/newjilo.conf"));
        assert!(!config.requires_sudo("config_file", "/home/dev/provis/site.conf"));
    }

    #[test]
    fn test_unprivileged_allowlist() {
        let config = SudoConfig {
            unprivileged: vec!["/etc/nginx/sites-available/newjilo.conf".to_string()],
        };
        assert!(!config.requires_sudo("config_file", "/etc/nginx/sites-available/newjilo.conf"));
        assert!(config.requires_sudo("config_file", "/etc/supervisor/conf.d/newjilo.conf"));
    }
}
